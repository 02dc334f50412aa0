pub mod librato;
pub mod proxy;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::flush::Flush;
use crate::metrics::aggregator::ResetPolicy;

pub use librato::LibratoSink;
pub use proxy::ProxySink;

/// Downstream delivery target for a finished flush.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short label used in logs and the admin report.
    fn name(&self) -> &'static str;

    /// What the scheduler drains from the aggregator on every tick.
    fn reset_policy(&self) -> ResetPolicy;

    /// Deliver one flush. Returns the number of measurements sent.
    async fn deliver(&self, flush: &Flush) -> Result<usize, SinkError>;
}
