pub mod stats;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::metrics::aggregator::{ResetPolicy, Snapshot};
use crate::metrics::percentiles;
use crate::metrics::summary::{CounterSummary, GaugeSummary};
use crate::metrics::{Aggregator, Summary};
use crate::shutdown::ShutdownReceiver;
use crate::sinks::Sink;

pub use stats::{FlushReport, FlushStats};

/// Everything a sink needs for one interval.
#[derive(Debug, Clone)]
pub struct Flush {
    pub summaries: Vec<Summary>,
    /// Raw state the summaries were built from, for forwarding sinks
    pub snapshot: Snapshot,
    /// Global source applied to the whole payload
    pub source: Option<String>,
    pub flushed_at: DateTime<Utc>,
}

/// How a single tick ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to send; the sink was not called.
    Empty,
    Delivered(usize),
    Failed(String),
}

/// Summary construction options shared by every tick.
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    /// Normalized threshold list, always containing 100
    pub percentiles: Vec<f64>,
    pub with_median: bool,
}

impl SummaryOptions {
    pub fn new(configured: &[f64], with_median: bool) -> Self {
        Self {
            percentiles: percentiles::threshold_set(configured),
            with_median,
        }
    }
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self::new(&[], false)
    }
}

/// Turn a snapshot into flush records: one per counter, one per gauge, and
/// one per timer per threshold that keeps at least one sample.
pub fn build_summaries(snapshot: &Snapshot, options: &SummaryOptions) -> Vec<Summary> {
    let mut summaries = Vec::with_capacity(
        snapshot.counters.len()
            + snapshot.gauges.len()
            + snapshot.timers.len() * options.percentiles.len(),
    );

    for (key, value) in &snapshot.counters {
        summaries.push(Summary::Counter(CounterSummary::from_key(key, *value)));
    }
    for (key, value) in &snapshot.gauges {
        summaries.push(Summary::Gauge(GaugeSummary::from_key(key, *value)));
    }
    for (key, samples) in &snapshot.timers {
        let mut sorted = samples.clone();
        for &pct in &options.percentiles {
            if let Some(t) = percentiles::summarize(key, &mut sorted, pct, options.with_median) {
                summaries.push(Summary::Timer(t));
            }
        }
    }

    summaries
}

/// Periodic snapshot-and-reset driver.
pub struct Flusher {
    aggregator: Arc<Aggregator>,
    sink: Arc<dyn Sink>,
    options: SummaryOptions,
    source: Option<String>,
    stats: Arc<FlushStats>,
}

impl Flusher {
    pub fn new(
        aggregator: Arc<Aggregator>,
        sink: Arc<dyn Sink>,
        options: SummaryOptions,
        source: Option<String>,
    ) -> Self {
        let stats = Arc::new(FlushStats::new(sink.name(), sink.reset_policy()));
        Self {
            aggregator,
            sink,
            options,
            source,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<FlushStats> {
        self.stats.clone()
    }

    /// Run one tick with the sink's own reset policy.
    pub async fn flush(&self) -> FlushOutcome {
        self.flush_with(self.sink.reset_policy()).await
    }

    /// Run one tick: snapshot and reset atomically, summarize, hand off.
    ///
    /// The reset happens before delivery, so a failed delivery loses the
    /// interval. Failures are logged and reported, never retried.
    pub async fn flush_with(&self, policy: ResetPolicy) -> FlushOutcome {
        let snapshot = self.aggregator.snapshot_and_reset(policy);
        let summaries = build_summaries(&snapshot, &self.options);

        if summaries.is_empty() {
            debug!("No new measurements this interval.");
            self.stats.record_empty();
            return FlushOutcome::Empty;
        }

        let flush = Flush {
            summaries,
            snapshot,
            source: self.source.clone(),
            flushed_at: Utc::now(),
        };

        let started = Instant::now();
        let result = self.sink.deliver(&flush).await;
        let elapsed_us = started.elapsed().as_micros() as u64;

        match result {
            Ok(sent) => {
                info!(sink = self.sink.name(), measurements = sent, "Measurements sent.");
                self.stats.record_delivery(flush.flushed_at, sent, elapsed_us);
                FlushOutcome::Delivered(sent)
            }
            Err(e) => {
                warn!(
                    sink = self.sink.name(),
                    summaries = flush.summaries.len(),
                    error = %e,
                    "Error sending measurements."
                );
                let message = e.to_string();
                self.stats.record_failure(flush.flushed_at, message.clone(), elapsed_us);
                FlushOutcome::Failed(message)
            }
        }
    }

    /// Tick every `every` until shutdown. A tick that comes due while a flush
    /// is still in flight is skipped rather than queued.
    pub async fn run(self, every: Duration, mut shutdown: ShutdownReceiver) {
        let mut ticker = interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            sink = self.sink.name(),
            interval_secs = every.as_secs(),
            percentiles = ?self.options.percentiles,
            "Flush scheduler started."
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!("Flush scheduler stopping.");
                    break;
                }
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }
    }
}
