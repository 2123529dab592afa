use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

/// Generate a request id (32 hex characters; a UUID without hyphens).
pub fn generate_request_id() -> String {
    Uuid::new_v4().as_simple().to_string()
}

/// Axum middleware that injects `X-Request-Id` headers and creates a tracing
/// span for each request.
///
/// If the incoming request already has an `X-Request-Id` header, that value
/// is reused; otherwise a fresh id is generated. The response always carries
/// the header for correlation.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(generate_request_id);

    // Insert/overwrite so downstream handlers can read it.
    request.headers_mut().insert(
        "x-request-id",
        request_id
            .parse()
            .unwrap_or_else(|_| axum::http::HeaderValue::from_static("unknown")),
    );

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let _guard = span.enter();

    let mut response = next.run(request).await;

    if let Ok(val) = request_id.parse() {
        response.headers_mut().insert("x-request-id", val);
    }

    response
}
