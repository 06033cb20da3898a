// Services module - business logic layer

pub mod comment_service;
pub mod draft_service;
pub mod profile_service;
pub mod review_service;
pub mod user_service;

pub use comment_service::CommentService;
pub use draft_service::DraftService;
pub use profile_service::ProfileService;
pub use review_service::ReviewService;
pub use user_service::{UserService, UserServiceSettings};

use std::future::Future;

use crate::models::{RepositoryError, ServiceError, ServiceResult};

/// Attempts at claiming `max + 1` before giving up on a busy table
pub const MAX_ID_ALLOCATION_ATTEMPTS: usize = 5;

/// Log a store failure and hide it behind a fixed client-facing message.
pub(crate) fn store_error(message: &'static str) -> impl FnOnce(RepositoryError) -> ServiceError {
    move |source| {
        crate::error_with_trace!(error = %source, "{}", message);
        ServiceError::Storage { message, source }
    }
}

/// Insert a record under the next free numeric id.
///
/// Reads the current maximum, then calls `insert` with `max + 1` (or 1 on
/// an empty table). The insert must be conditional on the id being unused
/// and report `AlreadyExists` otherwise, in which case the maximum is read
/// again. Any other failure goes through `on_error`.
pub(crate) async fn insert_with_next_id<M, MF, I, IF, E>(
    entity: &'static str,
    max_id: M,
    insert: I,
    on_error: E,
) -> ServiceResult<u64>
where
    M: Fn() -> MF,
    MF: Future<Output = Result<Option<u64>, RepositoryError>>,
    I: Fn(u64) -> IF,
    IF: Future<Output = Result<(), RepositoryError>>,
    E: FnOnce(RepositoryError) -> ServiceError,
{
    for attempt in 1..=MAX_ID_ALLOCATION_ATTEMPTS {
        let current = match max_id().await {
            Ok(current) => current,
            Err(e) => return Err(on_error(e)),
        };
        let id = current.map_or(1, |max| max.saturating_add(1));

        match insert(id).await {
            Ok(()) => return Ok(id),
            Err(RepositoryError::AlreadyExists) => {
                crate::warn_with_trace!(entity, id, attempt, "Id already taken, retrying");
            }
            Err(e) => return Err(on_error(e)),
        }
    }

    crate::error_with_trace!(entity, "Gave up allocating an id");
    Err(ServiceError::ConcurrentModification { entity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_first_id_is_one() {
        let id = insert_with_next_id(
            "Review",
            || async { Ok(None) },
            |_| async { Ok(()) },
            store_error("Could not add review"),
        )
        .await
        .unwrap();

        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn test_collision_rereads_maximum() {
        // Another writer claims 8 between our read and our insert.
        let max_cell = AtomicU64::new(7);
        let insert_count = AtomicUsize::new(0);
        let (max, inserts) = (&max_cell, &insert_count);

        let id = insert_with_next_id(
            "Review",
            move || async move { Ok(Some(max.load(Ordering::SeqCst))) },
            move |id| {
                let first = inserts.fetch_add(1, Ordering::SeqCst) == 0;
                if first {
                    max.store(id, Ordering::SeqCst);
                }
                async move {
                    if first {
                        Err(RepositoryError::AlreadyExists)
                    } else {
                        Ok(())
                    }
                }
            },
            store_error("Could not add review"),
        )
        .await
        .unwrap();

        assert_eq!(id, 9);
        assert_eq!(insert_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        let insert_count = AtomicUsize::new(0);
        let inserts = &insert_count;

        let result = insert_with_next_id(
            "Comment",
            || async { Ok(Some(1)) },
            move |_| {
                inserts.fetch_add(1, Ordering::SeqCst);
                async { Err(RepositoryError::AlreadyExists) }
            },
            store_error("Could not add comment"),
        )
        .await;

        assert!(matches!(
            result,
            Err(ServiceError::ConcurrentModification { entity: "Comment" })
        ));
        assert_eq!(insert_count.load(Ordering::SeqCst), MAX_ID_ALLOCATION_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_store_failure_is_mapped() {
        let result = insert_with_next_id(
            "Draft",
            || async { Err(RepositoryError::Timeout) },
            |_| async { Ok(()) },
            store_error("Could not store draft"),
        )
        .await;

        match result {
            Err(ServiceError::Storage { message, source }) => {
                assert_eq!(message, "Could not store draft");
                assert!(matches!(source, RepositoryError::Timeout));
            }
            other => panic!("Expected Storage error, got {:?}", other),
        }
    }
}
