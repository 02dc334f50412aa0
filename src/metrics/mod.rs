pub mod aggregator;
pub mod decoder;
pub mod percentiles;
pub mod stream;
pub mod summary;

pub use aggregator::{Aggregator, Snapshot};
pub use summary::Summary;

/// The three metric types a statsd record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// `c`: summed within (and, for accumulating sinks, across) intervals
    Counter,
    /// `g`: last write wins
    Gauge,
    /// `ms`: every value is kept until the next flush
    Timer,
}

impl MetricKind {
    /// Wire token used in the inbound record and by the proxy sink.
    pub fn token(self) -> &'static str {
        match self {
            Self::Counter => "c",
            Self::Gauge => "g",
            Self::Timer => "ms",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "c" => Some(Self::Counter),
            "g" => Some(Self::Gauge),
            "ms" => Some(Self::Timer),
            _ => None,
        }
    }
}

/// A single decoded observation.
/// This is the "write" side: listeners decode these and push them in.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Raw accumulation key, possibly carrying a `source,` prefix
    pub name: String,
    pub kind: MetricKind,
    /// Already rate-adjusted for counters
    pub value: f64,
    /// Sampling rate as sent, in `(0, 1]`
    pub sample_rate: f64,
}
