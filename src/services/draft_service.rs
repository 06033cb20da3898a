use std::sync::Arc;
use tracing::instrument;

use super::{insert_with_next_id, store_error};
use crate::models::{
    validate_user_id, CreateDraftRequest, Draft, RepositoryError, ServiceError, ServiceResult,
    Validate,
};
use crate::repositories::{DraftRepository, ReviewRepository};

/// Service for unpublished reviews
pub struct DraftService {
    drafts: Arc<dyn DraftRepository>,
    reviews: Arc<dyn ReviewRepository>,
}

impl DraftService {
    pub fn new(drafts: Arc<dyn DraftRepository>, reviews: Arc<dyn ReviewRepository>) -> Self {
        Self { drafts, reviews }
    }

    #[instrument(skip(self, request), fields(author = %request.author))]
    pub async fn store_draft(&self, request: CreateDraftRequest) -> ServiceResult<u64> {
        request.validate()?;

        let drafts = &self.drafts;
        let request = &request;
        let id = insert_with_next_id(
            "Draft",
            move || drafts.max_id(),
            move |id| drafts.create(request.clone().into_draft(id)),
            store_error("Could not store draft"),
        )
        .await?;

        crate::info_with_trace!(id, "Draft stored");
        Ok(id)
    }

    #[instrument(skip(self), fields(author = %author))]
    pub async fn get_drafts_by_author(&self, author: &str) -> ServiceResult<Vec<Draft>> {
        validate_user_id(author)?;

        self.drafts
            .find_by_author(author)
            .await
            .map_err(store_error("Could not fetch drafts"))
    }

    /// Turn a draft into a review and return the new review id.
    ///
    /// The review insert and the draft delete commit together; a missing
    /// draft creates nothing.
    #[instrument(skip(self), fields(draft_id = draft_id, requested_by = %requested_by))]
    pub async fn publish_draft(&self, draft_id: u64, requested_by: &str) -> ServiceResult<u64> {
        crate::info_with_trace!("Publishing draft");

        let draft_not_found = || ServiceError::NotFound {
            entity: "Draft",
            id: draft_id.to_string(),
        };

        let draft = self
            .drafts
            .find_by_id(draft_id)
            .await
            .map_err(store_error("Could not publish draft"))?
            .ok_or_else(draft_not_found)?;

        if draft.author != requested_by {
            return Err(ServiceError::Forbidden {
                message: "Only the author can publish a draft".to_string(),
            });
        }

        let reviews = &self.reviews;
        let drafts = &self.drafts;
        let draft = &draft;
        let review_id = insert_with_next_id(
            "Review",
            move || reviews.max_id(),
            move |id| drafts.publish(draft_id, draft.to_review(id)),
            |e| match e {
                RepositoryError::NotFound => {
                    crate::warn_with_trace!("Draft disappeared before publishing");
                    draft_not_found()
                }
                other => store_error("Could not publish draft")(other),
            },
        )
        .await?;

        crate::info_with_trace!(review_id, "Draft published");
        Ok(review_id)
    }
}
