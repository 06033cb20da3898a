use std::sync::Arc;
use tracing::instrument;

use super::store_error;
use crate::models::{validate_user_id, Profile, RepositoryError, ServiceError, ServiceResult};
use crate::repositories::ProfileRepository;

/// Rounds of read-then-conditional-remove before reporting contention
const MAX_UNSAVE_ATTEMPTS: usize = 5;

/// Service for the per-user saved review list
pub struct ProfileService {
    repository: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    pub fn new(repository: Arc<dyn ProfileRepository>) -> Self {
        Self { repository }
    }

    /// Append a review id to the saved list. Duplicates are kept.
    #[instrument(skip(self), fields(user_name = %user_name, review_id = review_id))]
    pub async fn save_review(&self, user_name: &str, review_id: u64) -> ServiceResult<Vec<u64>> {
        validate_user_id(user_name)?;

        let saved = self
            .repository
            .append_saved(user_name, review_id)
            .await
            .map_err(store_error("Could not save review"))?;

        crate::info_with_trace!("Saved list now holds {} reviews", saved.len());
        Ok(saved)
    }

    #[instrument(skip(self), fields(user_name = %user_name))]
    pub async fn get_user_saved_reviews(&self, user_name: &str) -> ServiceResult<Vec<u64>> {
        validate_user_id(user_name)?;

        self.repository
            .find_saved(user_name)
            .await
            .map_err(store_error("Could not fetch saved reviews"))?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "Profile",
                id: user_name.to_string(),
            })
    }

    /// Remove the first occurrence of `review_id`.
    ///
    /// The removal only applies if the slot still holds `review_id`; when
    /// the list moved underneath us it is read again.
    #[instrument(skip(self), fields(user_name = %user_name, review_id = review_id))]
    pub async fn unsave_review(&self, user_name: &str, review_id: u64) -> ServiceResult<()> {
        validate_user_id(user_name)?;

        for attempt in 1..=MAX_UNSAVE_ATTEMPTS {
            let profile = Profile {
                user_name: user_name.to_string(),
                saved: self.get_user_saved_reviews(user_name).await?,
            };

            let Some(index) = profile.position_of(review_id) else {
                crate::warn_with_trace!("Review is not in the saved list");
                return Err(ServiceError::NotFound {
                    entity: "Saved review",
                    id: review_id.to_string(),
                });
            };

            match self
                .repository
                .remove_saved_at(user_name, index, review_id)
                .await
            {
                Ok(()) => {
                    crate::info_with_trace!("Review removed from saved list");
                    return Ok(());
                }
                Err(RepositoryError::ConditionFailed) => {
                    crate::warn_with_trace!(attempt, "Saved list changed concurrently, retrying");
                }
                Err(e) => return Err(store_error("Could not unsave review")(e)),
            }
        }

        Err(ServiceError::ConcurrentModification { entity: "Profile" })
    }
}
