use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::aggregator::AggregateView;
use crate::flush::FlushReport;
use crate::AppState;

// ─── GET /api/metrics ────────────────────────────────────────────
/// Current aggregate state as JSON, without resetting anything.

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<AggregateView> {
    Json(state.aggregator.view())
}

// ─── GET /api/metrics/stream ─────────────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes the same view as `/api/metrics` once a second.

pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(Duration::from_secs(1));

    let stream = IntervalStream::new(interval).map(move |_| {
        let view = state.aggregator.view();
        let json = serde_json::to_string(&view).unwrap_or_default();
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// ─── GET /api/flush ──────────────────────────────────────────────
/// Delivery bookkeeping from the flush scheduler.

pub async fn get_flush(State(state): State<Arc<AppState>>) -> Json<FlushReport> {
    Json(state.flush_stats.report())
}
