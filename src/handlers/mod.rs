pub mod admin;
pub mod comments;
pub mod drafts;
pub mod health;
pub mod middleware;
pub mod responses;
pub mod reviews;
pub mod users;

pub use health::{health_check, metrics_handler};
pub use middleware::{request_validation_middleware, security_headers_middleware, RequestLimits};
pub use responses::{error_response, service_error_to_response, HandlerError, HandlerResult};

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::Body,
        http::{header, Method, Request, Response},
        Router,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::app::{create_app, AppState, Repositories};
    use crate::auth::{LoggingCodeDelivery, TokenIssuer};
    use crate::observability::Metrics;
    use crate::repositories::InMemoryStore;
    use crate::services::UserServiceSettings;

    /// Full router over an empty in-memory store
    pub fn test_app() -> (Router, Arc<TokenIssuer>) {
        let tokens = Arc::new(TokenIssuer::new(
            b"handler-tests-secret-handler-tests",
            Duration::from_secs(300),
        ));
        let state = AppState::new(
            Repositories::in_memory(Arc::new(InMemoryStore::new())),
            tokens.clone(),
            Arc::new(LoggingCodeDelivery),
            UserServiceSettings {
                password_hash_cost: 4,
                require_confirmation: false,
            },
            Arc::new(Metrics::new().unwrap()),
        );

        (
            create_app(state, Duration::from_secs(5), 64 * 1024),
            tokens,
        )
    }

    /// `Value::Null` sends no body
    pub fn json_request(
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        if body.is_null() {
            builder.body(Body::empty()).unwrap()
        } else {
            builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        }
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
