use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

/// times every handler and logs method, path, status and latency
pub async fn track_latency(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    info!(
        "{} {} -> {} in {}ms",
        method,
        path,
        response.status(),
        start.elapsed().as_millis()
    );
    response
}
