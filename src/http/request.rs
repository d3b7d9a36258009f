//! Request ID handling.
//!
//! # Responsibilities
//! - Assign a UUID v4 request ID when the client did not send one
//! - Echo the ID on the response so clients can correlate logs

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Middleware: ensure every request carries an ID and echo it back.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&id) {
        request.headers_mut().insert(X_REQUEST_ID, value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert(X_REQUEST_ID, value);
        response
    } else {
        next.run(request).await
    }
}
