use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::Sink;
use crate::error::SinkError;
use crate::flush::Flush;
use crate::metrics::aggregator::{ResetPolicy, Snapshot};
use crate::metrics::MetricKind;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Render the raw snapshot as statsd lines, one per counter, gauge and
/// individual timer sample. Keys keep their source prefix.
///
/// Returns the payload and the number of measurements in it.
pub fn build_payload(snapshot: &Snapshot) -> (String, usize) {
    let mut out = String::new();

    for (key, value) in &snapshot.counters {
        push_line(&mut out, key, *value, MetricKind::Counter);
    }
    for (key, value) in &snapshot.gauges {
        push_line(&mut out, key, *value, MetricKind::Gauge);
    }
    for (key, samples) in &snapshot.timers {
        for value in samples {
            push_line(&mut out, key, *value, MetricKind::Timer);
        }
    }

    (out, snapshot.raw_len())
}

fn push_line(out: &mut String, key: &str, value: f64, kind: MetricKind) {
    // Writing into a String cannot fail
    let _ = writeln!(out, "{key}:{value:.6}|{}", kind.token());
}

/// Forwards raw samples to another statsd over TCP.
pub struct ProxySink {
    addr: String,
}

impl ProxySink {
    pub fn new(addr: String) -> Self {
        Self { addr }
    }

    async fn send(&self, payload: &[u8]) -> Result<(), SinkError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| SinkError::Connect {
                addr: self.addr.clone(),
                source,
            })?;

        let write_err = |source| SinkError::Write {
            addr: self.addr.clone(),
            source,
        };
        stream.write_all(payload).await.map_err(write_err)?;
        stream.shutdown().await.map_err(write_err)?;
        Ok(())
    }
}

#[async_trait]
impl Sink for ProxySink {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn reset_policy(&self) -> ResetPolicy {
        ResetPolicy::All
    }

    async fn deliver(&self, flush: &Flush) -> Result<usize, SinkError> {
        let (payload, count) = build_payload(&flush.snapshot);
        debug!(addr = %self.addr, bytes = payload.len(), "Sending payload.");

        timeout(DELIVERY_TIMEOUT, self.send(payload.as_bytes()))
            .await
            .map_err(|_| SinkError::Timeout {
                addr: self.addr.clone(),
            })??;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;
    use crate::flush::{build_summaries, SummaryOptions};
    use crate::metrics::{Aggregator, Sample};

    fn seeded() -> Aggregator {
        let agg = Aggregator::new();
        let rows = [
            ("a", MetricKind::Counter, 15.0),
            ("a", MetricKind::Counter, 25.0),
            ("b", MetricKind::Counter, 90.0),
            ("a", MetricKind::Gauge, 15.1),
            ("a", MetricKind::Gauge, 25.1),
            ("b", MetricKind::Gauge, 90.1),
            ("c", MetricKind::Timer, 15.3),
            ("c", MetricKind::Timer, 25.3),
            ("d", MetricKind::Timer, 90.3),
        ];
        for (name, kind, value) in rows {
            agg.apply(Sample {
                name: name.into(),
                kind,
                value,
                sample_rate: 1.0,
            });
        }
        agg
    }

    fn sorted_lines(s: &str) -> Vec<&str> {
        let mut lines: Vec<_> = s.lines().collect();
        lines.sort_unstable();
        lines
    }

    #[test]
    fn payload_has_one_line_per_raw_measurement() {
        let (payload, count) = build_payload(&seeded().snapshot());
        assert_eq!(count, 7);
        assert_eq!(
            sorted_lines(&payload),
            sorted_lines(
                "a:40.000000|c\n\
                 b:90.000000|c\n\
                 a:25.100000|g\n\
                 b:90.100000|g\n\
                 c:15.300000|ms\n\
                 c:25.300000|ms\n\
                 d:90.300000|ms\n"
            )
        );
    }

    #[test]
    fn payload_keeps_source_prefix() {
        let agg = Aggregator::new();
        agg.apply(Sample {
            name: "web01,hits".into(),
            kind: MetricKind::Counter,
            value: 1.0,
            sample_rate: 1.0,
        });
        let (payload, _) = build_payload(&agg.snapshot());
        assert_eq!(payload, "web01,hits:1.000000|c\n");
    }

    #[tokio::test]
    async fn delivers_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let reader = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut buf = String::new();
            conn.read_to_string(&mut buf).await.unwrap();
            buf
        });

        let snapshot = seeded().snapshot();
        let flush = Flush {
            summaries: build_summaries(&snapshot, &SummaryOptions::default()),
            snapshot,
            source: None,
            flushed_at: chrono::Utc::now(),
        };
        let sink = ProxySink::new(addr);
        assert_eq!(sink.deliver(&flush).await.unwrap(), 7);

        let received = reader.await.unwrap();
        assert_eq!(received.lines().count(), 7);
        assert!(received.contains("d:90.300000|ms\n"));
    }

    #[tokio::test]
    async fn unreachable_proxy_is_a_connect_error() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().to_string()
        };
        let sink = ProxySink::new(addr);
        let flush = Flush {
            summaries: Vec::new(),
            snapshot: seeded().snapshot(),
            source: None,
            flushed_at: chrono::Utc::now(),
        };
        assert!(matches!(
            sink.deliver(&flush).await,
            Err(SinkError::Connect { .. })
        ));
    }
}
