use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::responses::{error_response, HandlerResult};

/// Limits enforced before a request reaches the router
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub max_request_size: usize,
}

fn content_length(request: &Request<Body>) -> Option<u64> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// Reject oversized requests and non-JSON bodies
pub async fn request_validation_middleware(
    State(limits): State<RequestLimits>,
    request: Request<Body>,
    next: Next,
) -> HandlerResult<Response> {
    validate_request_size(&request, limits.max_request_size)?;
    validate_content_type(&request)?;

    Ok(next.run(request).await)
}

/// Only requests that actually carry a body must declare it as JSON
fn validate_content_type(request: &Request<Body>) -> HandlerResult<()> {
    let method = request.method();
    if method != "POST" && method != "PUT" && method != "PATCH" {
        return Ok(());
    }

    match request.headers().get(header::CONTENT_TYPE) {
        Some(content_type) => {
            let content_type = content_type.to_str().unwrap_or("");
            if !content_type.starts_with("application/json") {
                warn!("Invalid content type: {}", content_type);
                return Err(error_response(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "Content-Type must be application/json",
                ));
            }
        }
        None if content_length(request).unwrap_or(0) > 0 => {
            warn!("Body sent without content type");
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Content-Type header is required for requests with body",
            ));
        }
        None => {}
    }

    Ok(())
}

fn validate_request_size(request: &Request<Body>, max_request_size: usize) -> HandlerResult<()> {
    if let Some(length) = content_length(request) {
        if length > max_request_size as u64 {
            warn!("Request too large: {} bytes", length);
            return Err(error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                &format!(
                    "Request size {} bytes exceeds maximum of {} bytes",
                    length, max_request_size
                ),
            ));
        }
    }

    Ok(())
}

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    response
}
