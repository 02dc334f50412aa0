use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use super::Sink;
use crate::error::SinkError;
use crate::flush::Flush;
use crate::metrics::aggregator::ResetPolicy;
use crate::metrics::summary::{CounterSummary, GaugeSummary, TimerSummary};
use crate::metrics::Summary;

pub const DEFAULT_URL: &str = "https://metrics-api.librato.com/v1/metrics";
const CLIENT_USER_AGENT: &str = "statsd/1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── Wire types ──────────────────────────────────────────────────

/// Request body for `POST /v1/metrics`.
#[derive(Debug, Serialize)]
pub struct Measurement<'a> {
    pub counters: Vec<&'a CounterSummary>,
    pub gauges: Vec<GaugeEntry<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'a str>,
}

/// Librato carries timer statistics as "complex" gauges.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GaugeEntry<'a> {
    Simple(&'a GaugeSummary),
    Complex(&'a TimerSummary),
}

impl<'a> Measurement<'a> {
    pub fn build(flush: &'a Flush) -> Self {
        let mut counters = Vec::new();
        let mut gauges = Vec::new();
        for summary in &flush.summaries {
            match summary {
                Summary::Counter(c) => counters.push(c),
                Summary::Gauge(g) => gauges.push(GaugeEntry::Simple(g)),
                Summary::Timer(t) => gauges.push(GaugeEntry::Complex(t)),
            }
        }
        Self {
            counters,
            gauges,
            source: flush.source.as_deref(),
        }
    }

    pub fn count(&self) -> usize {
        self.counters.len() + self.gauges.len()
    }
}

// ─── Sink ────────────────────────────────────────────────────────

/// Posts each flush as JSON to the Librato metrics API.
pub struct LibratoSink {
    client: reqwest::Client,
    url: String,
    user: String,
    token: String,
}

impl LibratoSink {
    pub fn new(url: String, user: String, token: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            user,
            token,
        })
    }
}

#[async_trait]
impl Sink for LibratoSink {
    fn name(&self) -> &'static str {
        "librato"
    }

    fn reset_policy(&self) -> ResetPolicy {
        ResetPolicy::Timers
    }

    async fn deliver(&self, flush: &Flush) -> Result<usize, SinkError> {
        let measurement = Measurement::build(flush);
        let payload = serde_json::to_vec_pretty(&measurement)
            .map_err(|source| SinkError::Serialize { source })?;

        debug!(payload = %String::from_utf8_lossy(&payload), "Sending payload.");

        let resp = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.token))
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .body(payload)
            .send()
            .await
            .map_err(|source| SinkError::Http { source })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Status { status, body });
        }

        Ok(measurement.count())
    }
}
