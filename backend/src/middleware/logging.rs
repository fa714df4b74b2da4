use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::transaction::{LogFields, DB_LOG_FIELD};

/// Middleware that emits one completion event per request, carrying the log
/// fields collected by inner layers (for example the `db` time recorded by the
/// transaction middleware).
pub async fn log_requests(mut req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let uri = req.uri().to_string();
    let start = Instant::now();

    let fields = LogFields::new();
    req.extensions_mut().insert(fields.clone());

    let response = next.run(req).await;

    log_completion(
        response.status().as_u16(),
        &method,
        &uri,
        start.elapsed().as_millis() as u64,
        &fields,
    );
    response
}

fn log_completion(status: u16, method: &str, uri: &str, latency_ms: u64, fields: &LogFields) {
    let db_ms = fields
        .duration(DB_LOG_FIELD)
        .map(|db| db.as_secs_f64() * 1000.0);
    let extra = format!("{:?}", fields);

    if status >= 500 {
        tracing::error!(
            status,
            method,
            uri,
            latency_ms,
            db_ms,
            fields = %extra,
            "Request completed with error status"
        );
    } else if status >= 400 {
        tracing::warn!(
            status,
            method,
            uri,
            latency_ms,
            db_ms,
            fields = %extra,
            "Request completed with error status"
        );
    } else {
        tracing::info!(
            status,
            method,
            uri,
            latency_ms,
            db_ms,
            fields = %extra,
            "Request completed"
        );
    }
}
