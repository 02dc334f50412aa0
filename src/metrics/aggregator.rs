use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::Serialize;

use super::{MetricKind, Sample};

// ─── Public types ────────────────────────────────────────────────

/// Which parts of the aggregate state a flush drains.
///
/// The policy belongs to the sink: accumulating backends keep counters as a
/// running total, batch-forwarding backends treat every interval as fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Clear timers only; counters and gauges stand.
    Timers,
    /// Clear counters, gauges and timers.
    All,
}

/// Thread-safe aggregation engine.
/// Listeners call `apply()`, the flush scheduler calls `snapshot_and_reset()`.
pub struct Aggregator {
    inner: Mutex<Inner>,
}

/// Point-in-time copy of every accumulation bucket, keyed by raw name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub counters: BTreeMap<String, f64>,
    pub gauges: BTreeMap<String, f64>,
    pub timers: BTreeMap<String, Vec<f64>>,
}

/// Lightweight view for the admin endpoints: timers are reduced to counts.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateView {
    pub counters: BTreeMap<String, f64>,
    pub gauges: BTreeMap<String, f64>,
    pub timer_samples: BTreeMap<String, usize>,
    pub total_timer_samples: usize,
}

// ─── Internal state ──────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    counters: HashMap<String, f64>,
    gauges: HashMap<String, f64>,
    timers: HashMap<String, Vec<f64>>,
}

// ─── Aggregator impl ─────────────────────────────────────────────

impl Aggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Fold one decoded sample into the state. Total over its input.
    pub fn apply(&self, sample: Sample) {
        self.inner.lock().apply(sample);
    }

    /// Apply a whole decoded frame under a single lock acquisition.
    pub fn apply_all<I>(&self, samples: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut inner = self.inner.lock();
        for sample in samples {
            inner.apply(sample);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot()
    }

    pub fn reset_timers(&self) {
        self.inner.lock().timers.clear();
    }

    pub fn reset_all(&self) {
        *self.inner.lock() = Inner::default();
    }

    /// Copy the state and apply `policy` without releasing the lock, so no
    /// sample lands between the copy and the reset. An empty state is left
    /// untouched.
    pub fn snapshot_and_reset(&self, policy: ResetPolicy) -> Snapshot {
        let mut inner = self.inner.lock();
        let snapshot = inner.snapshot();
        if snapshot.is_empty() {
            return snapshot;
        }
        match policy {
            ResetPolicy::Timers => inner.timers.clear(),
            ResetPolicy::All => *inner = Inner::default(),
        }
        snapshot
    }

    pub fn view(&self) -> AggregateView {
        let inner = self.inner.lock();
        let timer_samples: BTreeMap<_, _> = inner
            .timers
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();
        AggregateView {
            counters: sorted(&inner.counters),
            gauges: sorted(&inner.gauges),
            total_timer_samples: timer_samples.values().sum(),
            timer_samples,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn apply(&mut self, sample: Sample) {
        match sample.kind {
            MetricKind::Counter => {
                *self.counters.entry(sample.name).or_insert(0.0) += sample.value;
            }
            MetricKind::Gauge => {
                self.gauges.insert(sample.name, sample.value);
            }
            // Unbounded within an interval; nothing caps a noisy sender
            MetricKind::Timer => {
                self.timers.entry(sample.name).or_default().push(sample.value);
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            counters: sorted(&self.counters),
            gauges: sorted(&self.gauges),
            timers: sorted(&self.timers),
        }
    }
}

fn sorted<V: Clone>(map: &HashMap<String, V>) -> BTreeMap<String, V> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.gauges.is_empty() && self.timers.is_empty()
    }

    /// Counters + gauges + every individual timer sample.
    pub fn raw_len(&self) -> usize {
        self.counters.len() + self.gauges.len() + self.timers.values().map(Vec::len).sum::<usize>()
    }
}
