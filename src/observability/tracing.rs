use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{self, RandomIdGenerator, Sampler},
    Resource,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Failed to initialize OpenTelemetry: {0}")]
    OpenTelemetryInit(#[from] opentelemetry::trace::TraceError),
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Filter used when `RUST_LOG` is unset: the service at `log_level`, the
/// HTTP and AWS layers at info.
fn default_filter(service_name: &str, log_level: &str) -> String {
    format!(
        "{}={},reviews_rs::http={},tower_http=info,aws_sdk_dynamodb=info,aws_config=info,aws_smithy_runtime=info",
        service_name.replace('-', "_"),
        log_level,
        log_level
    )
}

/// Install the OTLP tracer and the fmt subscriber (JSON or human-readable).
pub fn init_observability(
    service_name: &str,
    service_version: &str,
    otlp_endpoint: Option<&str>,
    log_level: &str,
    enable_json_logging: bool,
) -> Result<(), ObservabilityError> {
    info!(
        "Initializing observability for service: {} v{}",
        service_name, service_version
    );

    let tracer = init_opentelemetry_tracer(service_name, service_version, otlp_endpoint)?;

    let opentelemetry_layer = OpenTelemetryLayer::new(tracer);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(service_name, log_level).into());

    if enable_json_logging {
        // Span context goes to the tracer, not into every log line
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_level(true)
            .with_file(false)
            .with_line_number(false)
            .log_internal_errors(false)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(opentelemetry_layer)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| ObservabilityError::TracingInit(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(opentelemetry_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_span_events(FmtSpan::NONE),
            )
            .try_init()
            .map_err(|e| ObservabilityError::TracingInit(e.to_string()))?;
    }

    info!("Observability initialized successfully");
    Ok(())
}

/// Extract the current trace ID from the active span context
pub fn get_current_trace_id() -> Option<String> {
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let current_span = tracing::Span::current();
    let context = current_span.context();
    let span = context.span();
    let span_context = span.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

/// Macro to log info messages with trace ID
#[macro_export]
macro_rules! info_with_trace {
    ($($arg:tt)*) => {
        if let Some(trace_id) = $crate::observability::tracing::get_current_trace_id() {
            tracing::info!(trace_id = %trace_id, $($arg)*);
        } else {
            tracing::info!($($arg)*);
        }
    };
}

/// Macro to log error messages with trace ID
#[macro_export]
macro_rules! error_with_trace {
    ($($arg:tt)*) => {
        if let Some(trace_id) = $crate::observability::tracing::get_current_trace_id() {
            tracing::error!(trace_id = %trace_id, $($arg)*);
        } else {
            tracing::error!($($arg)*);
        }
    };
}

/// Macro to log warn messages with trace ID
#[macro_export]
macro_rules! warn_with_trace {
    ($($arg:tt)*) => {
        if let Some(trace_id) = $crate::observability::tracing::get_current_trace_id() {
            tracing::warn!(trace_id = %trace_id, $($arg)*);
        } else {
            tracing::warn!($($arg)*);
        }
    };
}

/// Initialize OpenTelemetry tracer with OTLP exporter for CloudWatch X-Ray integration
fn init_opentelemetry_tracer(
    service_name: &str,
    service_version: &str,
    otlp_endpoint: Option<&str>,
) -> Result<opentelemetry_sdk::trace::Tracer, ObservabilityError> {
    info!("Initializing OpenTelemetry tracer");

    let resource_attributes = vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", service_version.to_string()),
        KeyValue::new("service.namespace", "reviews"),
        KeyValue::new("cloud.provider", "aws"),
        KeyValue::new("telemetry.sdk.name", "opentelemetry"),
        KeyValue::new("telemetry.sdk.language", "rust"),
    ];

    let resource = Resource::new(resource_attributes);

    let endpoint = otlp_endpoint
        .filter(|endpoint| !endpoint.is_empty())
        .unwrap_or(DEFAULT_OTLP_ENDPOINT);
    info!("Exporting traces to {}", endpoint);
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_max_events_per_span(64)
                .with_max_attributes_per_span(16)
                .with_max_links_per_span(16)
                .with_resource(resource),
        )
        .with_batch_config(
            trace::BatchConfig::default()
                .with_max_queue_size(2048)
                .with_max_export_batch_size(512)
                .with_max_export_timeout(Duration::from_secs(30))
                .with_scheduled_delay(Duration::from_millis(500)),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    info!("OpenTelemetry tracer initialized successfully");
    Ok(tracer)
}

/// Shutdown observability gracefully with timeout
pub async fn shutdown_observability() {
    info!("Shutting down observability");

    // Flushing pending spans blocks
    let shutdown_task = tokio::task::spawn_blocking(global::shutdown_tracer_provider);

    match tokio::time::timeout(Duration::from_secs(5), shutdown_task).await {
        Ok(Ok(())) => {
            info!("Observability shutdown completed successfully");
        }
        Ok(Err(e)) => {
            warn!("Error during observability shutdown: {}", e);
        }
        Err(_) => {
            warn!("Observability shutdown timed out after 5 seconds");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_uses_crate_target_and_level() {
        let filter = default_filter("reviews-rs", "debug");
        assert!(filter.starts_with("reviews_rs=debug,"));
        assert!(filter.contains("reviews_rs::http=debug"));
        assert!(filter.contains("aws_sdk_dynamodb=info"));
        assert!(filter.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_no_trace_id_outside_a_span() {
        assert_eq!(get_current_trace_id(), None);
    }

    #[tokio::test]
    async fn test_shutdown_without_provider_is_bounded() {
        let start = std::time::Instant::now();
        shutdown_observability().await;
        assert!(start.elapsed() < Duration::from_secs(6));
    }
}
