//! Request body dump
//!
//! Logs request bodies at debug level, then hands the buffered body on to the
//! router unchanged. Bodies that may exceed [`MAX_DUMP_BYTES`] are streamed
//! through untouched and only their size is logged.

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

/// Largest body that is buffered for the dump
pub const MAX_DUMP_BYTES: usize = 1024 * 1024;

pub async fn dump_body(request: Request, next: Next) -> Result<Response, StatusCode> {
    let hint = request.body().size_hint();
    let fits = matches!(hint.upper(), Some(n) if n <= MAX_DUMP_BYTES as u64);
    if !fits {
        debug!(
            "{} {} body: not dumped (at least {} bytes)",
            request.method(),
            request.uri(),
            hint.lower()
        );
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_DUMP_BYTES).await.map_err(|e| {
        error!("{} {} body read failed: {}", parts.method, parts.uri, e);
        StatusCode::BAD_REQUEST
    })?;

    if !bytes.is_empty() {
        debug!(
            "{} {} body: {}",
            parts.method,
            parts.uri,
            String::from_utf8_lossy(&bytes)
        );
    }

    Ok(next
        .run(Request::from_parts(parts, Body::from(bytes)))
        .await)
}
