use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::debug;

/// Adds two response headers to every admin request:
///
///   X-Response-Time-Us  : handler wall time in microseconds
///   Server-Timing       : same value in the standard Server-Timing format
pub async fn timing_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let us = elapsed.as_micros();

    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    // SSE responses return immediately; their timing is meaningless
    if !path.ends_with("/stream") {
        debug!(
            status = response.status().as_u16(),
            %method,
            path = %path,
            us = us as u64,
            "Admin request."
        );
    }

    response
}
