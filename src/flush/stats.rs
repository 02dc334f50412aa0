use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use crate::metrics::aggregator::ResetPolicy;

/// HdrHistogram range: 1 μs → 5 min, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 300_000_000;
const HIST_SIGFIG: u8 = 3;

/// Percentile breakdown of sink round-trip times, in microseconds.
#[derive(Debug, Clone, Serialize)]
pub struct LatencySet {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub count: u64,
}

impl LatencySet {
    /// Returns zeroed values if the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        Self {
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_percentile(50.0),
            p95: hist.value_at_percentile(95.0),
            p99: hist.value_at_percentile(99.0),
            count: hist.len(),
        }
    }

    pub fn empty() -> Self {
        Self {
            min: 0,
            max: 0,
            mean: 0.0,
            p50: 0,
            p95: 0,
            p99: 0,
            count: 0,
        }
    }
}

/// Bookkeeping the scheduler updates after every tick; read by `/api/flush`.
pub struct FlushStats {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlushReport {
    pub sink: &'static str,
    pub reset_policy: ResetPolicy,
    pub flushes: u64,
    pub failures: u64,
    pub empty_intervals: u64,
    pub last_flush_at: Option<DateTime<Utc>>,
    pub last_measurements: usize,
    pub last_error: Option<String>,
    pub delivery_latency_us: LatencySet,
}

struct Inner {
    sink: &'static str,
    reset_policy: ResetPolicy,
    flushes: u64,
    failures: u64,
    empty_intervals: u64,
    last_flush_at: Option<DateTime<Utc>>,
    last_measurements: usize,
    last_error: Option<String>,
    latency: Histogram<u64>,
}

impl FlushStats {
    pub fn new(sink: &'static str, reset_policy: ResetPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sink,
                reset_policy,
                flushes: 0,
                failures: 0,
                empty_intervals: 0,
                last_flush_at: None,
                last_measurements: 0,
                last_error: None,
                latency: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                    .expect("histogram creation"),
            }),
        }
    }

    pub fn record_empty(&self) {
        self.inner.lock().empty_intervals += 1;
    }

    pub fn record_delivery(&self, at: DateTime<Utc>, measurements: usize, elapsed_us: u64) {
        let mut inner = self.inner.lock();
        inner.flushes += 1;
        inner.last_flush_at = Some(at);
        inner.last_measurements = measurements;
        inner.last_error = None;
        let _ = inner.latency.record(elapsed_us.clamp(HIST_LOW, HIST_HIGH));
    }

    pub fn record_failure(&self, at: DateTime<Utc>, error: String, elapsed_us: u64) {
        let mut inner = self.inner.lock();
        inner.flushes += 1;
        inner.failures += 1;
        inner.last_flush_at = Some(at);
        inner.last_measurements = 0;
        inner.last_error = Some(error);
        let _ = inner.latency.record(elapsed_us.clamp(HIST_LOW, HIST_HIGH));
    }

    pub fn report(&self) -> FlushReport {
        let inner = self.inner.lock();
        FlushReport {
            sink: inner.sink,
            reset_policy: inner.reset_policy,
            flushes: inner.flushes,
            failures: inner.failures,
            empty_intervals: inner.empty_intervals,
            last_flush_at: inner.last_flush_at,
            last_measurements: inner.last_measurements,
            last_error: inner.last_error.clone(),
            delivery_latency_us: LatencySet::from_histogram(&inner.latency),
        }
    }
}
