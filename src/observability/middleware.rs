use axum::{
    extract::{MatchedPath, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::TraceContextExt;
use std::{sync::Arc, time::Instant};
use tracing::{error, info, warn, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Metrics;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// First hop of X-Forwarded-For, then X-Real-IP
fn client_ip(headers: &HeaderMap) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .or_else(|| header_str(headers, "x-real-ip"))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Server span plus HTTP metrics around every request.
///
/// Metrics are labelled with the matched route (`/reviews/:id`), not the raw
/// path, so ids do not explode label cardinality.
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let user_agent = header_str(request.headers(), "user-agent")
        .unwrap_or("unknown")
        .to_string();
    let client_ip = client_ip(request.headers());

    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let span_name = format!("{} {}", method, endpoint);
    let span = tracing::info_span!(
        target: "reviews_rs::http",
        "{}", span_name,
        otel.name = %span_name,
        otel.kind = "server",
        http.method = %method,
        http.route = %endpoint,
        http.url = %uri,
        http.user_agent = %user_agent,
        client.address = %client_ip,
        http.response.status_code = tracing::field::Empty,
        http.response_time_ms = tracing::field::Empty,
    );

    async {
        metrics.increment_in_flight(&method, &endpoint);

        let trace_id = tracing::Span::current()
            .context()
            .span()
            .span_context()
            .trace_id()
            .to_string();

        info!(trace_id = %trace_id, method = %method, path = %endpoint, client_ip = %client_ip, "Processing request");

        let response = next.run(request).await;

        let duration = start_time.elapsed();
        let duration_ms = duration.as_millis();
        let status_code = response.status().as_u16();

        let current_span = tracing::Span::current();
        current_span.record("http.response.status_code", status_code);
        current_span.record("http.response_time_ms", duration_ms);

        // Client errors are the caller's problem; only 5xx marks the span failed
        let otel_context = current_span.context();
        if status_code >= 500 {
            otel_context
                .span()
                .set_status(opentelemetry::trace::Status::error("HTTP server error"));
        } else {
            otel_context.span().set_status(opentelemetry::trace::Status::Ok);
        }

        metrics.record_http_request(&method, &endpoint, status_code, duration.as_secs_f64());
        metrics.decrement_in_flight(&method, &endpoint);

        if status_code >= 500 {
            error!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code,
                duration_ms,
                "Request failed"
            );
        } else if status_code >= 400 {
            warn!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code,
                duration_ms,
                user_agent = %user_agent,
                "Request rejected"
            );
        } else {
            info!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code,
                duration_ms,
                "Request completed"
            );
        }

        response
    }
    .instrument(span)
    .await
}
