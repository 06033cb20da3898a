use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use serde_json::Value;
use std::sync::Arc;

use super::{AuthError, TokenIssuer};
use crate::handlers::error_response;
use crate::models::{ServiceError, ServiceResult};

/// Identity of the caller, placed in request extensions by `require_auth`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl AuthenticatedUser {
    /// Forbid acting on behalf of anyone else.
    pub fn ensure_is(&self, user_name: &str) -> ServiceResult<()> {
        if self.user_id == user_name {
            Ok(())
        } else {
            crate::warn_with_trace!(
                caller = %self.user_id,
                target_user = %user_name,
                "Caller attempted to act as another user"
            );
            Err(ServiceError::Forbidden {
                message: format!("Token does not belong to {}", user_name),
            })
        }
    }
}

fn bearer_token(request: &Request) -> Result<&str, AuthError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let value = header
        .to_str()
        .map_err(|_| AuthError::InvalidToken("Authorization header is not valid text".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidToken("Expected a Bearer token".to_string()))
}

/// Verify the bearer token and attach `AuthenticatedUser`, or halt with 401.
pub async fn require_auth(
    State(tokens): State<Arc<TokenIssuer>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let claims = bearer_token(&request).and_then(|token| tokens.verify(token));

    match claims {
        Ok(claims) => {
            request.extensions_mut().insert(AuthenticatedUser {
                user_id: claims.sub,
            });
            Ok(next.run(request).await)
        }
        Err(e) => {
            crate::warn_with_trace!(error = %e, "Rejected unauthenticated request");
            let message = match e {
                AuthError::MissingToken => "Missing bearer token",
                AuthError::Expired => "Token expired",
                _ => "Invalid token",
            };
            Err(error_response(StatusCode::UNAUTHORIZED, message))
        }
    }
}
