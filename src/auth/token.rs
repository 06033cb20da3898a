use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Claims carried by every bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// `UserId` the token was issued to
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Issues and verifies HS256 bearer tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: &str) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret-key", Duration::from_secs(3600))
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer();
        let token = issuer.issue("alice").unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(Uuid::parse_str(&claims.jti).is_ok());
    }

    #[test]
    fn test_tokens_are_unique() {
        let issuer = issuer();
        assert_ne!(issuer.issue("alice").unwrap(), issuer.issue("alice").unwrap());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issuer().issue("alice").unwrap();
        let other = TokenIssuer::new(b"another-secret", Duration::from_secs(3600));

        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issuer = issuer();
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "alice".to_string(),
            iat: now - 120,
            exp: now - 60,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &issuer.encoding).unwrap();

        assert!(matches!(issuer.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            issuer().verify("not.a.token"),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_debug_hides_keys() {
        let rendered = format!("{:?}", issuer());
        assert!(!rendered.contains("test-secret-key"));
    }
}
