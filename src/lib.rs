use std::sync::Arc;

pub mod config;
pub mod error;
pub mod flush;
pub mod listener;
pub mod logger;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod shutdown;
pub mod sinks;

/// Shared state available to every admin handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Single writer point for every decoded sample.
    pub aggregator: Arc<metrics::Aggregator>,

    /// Written by the flush scheduler, read by `/api/flush`.
    pub flush_stats: Arc<flush::FlushStats>,
}
