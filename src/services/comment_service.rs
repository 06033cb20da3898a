use std::sync::Arc;
use tracing::instrument;

use super::{insert_with_next_id, store_error};
use crate::models::{Comment, CreateCommentRequest, ServiceResult, Validate};
use crate::repositories::CommentRepository;

/// Service for managing comments on reviews
pub struct CommentService {
    repository: Arc<dyn CommentRepository>,
}

impl CommentService {
    pub fn new(repository: Arc<dyn CommentRepository>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self))]
    pub async fn get_all_comments(&self) -> ServiceResult<Vec<Comment>> {
        self.repository
            .find_all()
            .await
            .map_err(store_error("Could not fetch comments"))
    }

    /// The review id is not checked against the Reviews table.
    #[instrument(skip(self, request), fields(author = %request.author, review_id = request.review_id))]
    pub async fn add_comment(&self, request: CreateCommentRequest) -> ServiceResult<u64> {
        request.validate()?;

        let repository = &self.repository;
        let request = &request;
        let id = insert_with_next_id(
            "Comment",
            move || repository.max_id(),
            move |id| repository.create(request.clone().into_comment(id)),
            store_error("Could not add comment"),
        )
        .await?;

        crate::info_with_trace!(id, "Comment added");
        Ok(id)
    }

    #[instrument(skip(self), fields(review_id = review_id))]
    pub async fn get_comments_by_review_id(&self, review_id: u64) -> ServiceResult<Vec<Comment>> {
        let comments = self
            .repository
            .find_by_review_id(review_id)
            .await
            .map_err(store_error("Could not fetch comments"))?;

        crate::info_with_trace!("Found {} comments", comments.len());
        Ok(comments)
    }
}
