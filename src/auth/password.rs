//! bcrypt hashing, run on the blocking pool so request tasks never stall.

use crate::models::{ServiceError, ServiceResult};

pub async fn hash_password(password: &str, cost: u32) -> ServiceResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ServiceError::Internal {
            message: format!("Password hashing task failed: {}", e),
        })?
        .map_err(|e| ServiceError::Internal {
            message: format!("Password hashing failed: {}", e),
        })
}

/// `Ok(false)` on a mismatch; malformed stored hashes are errors.
pub async fn verify_password(password: &str, password_hash: &str) -> ServiceResult<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &password_hash))
        .await
        .map_err(|e| ServiceError::Internal {
            message: format!("Password verification task failed: {}", e),
        })?
        .map_err(|e| ServiceError::Internal {
            message: format!("Password verification failed: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_password("correct horse", 4).await.unwrap();

        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("battery staple", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let first = hash_password("same password", 4).await.unwrap();
        let second = hash_password("same password", 4).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("anything", "plaintext").await,
            Err(ServiceError::Internal { .. })
        ));
    }
}
