use std::sync::Arc;
use tracing::instrument;

use super::{insert_with_next_id, store_error};
use crate::models::{
    validate_user_id, CreateReviewRequest, PageCursor, RepositoryError, Review, ReviewPage,
    ServiceError, ServiceResult, Validate, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::repositories::ReviewRepository;

/// Service for managing reviews
pub struct ReviewService {
    repository: Arc<dyn ReviewRepository>,
}

impl ReviewService {
    pub fn new(repository: Arc<dyn ReviewRepository>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self))]
    pub async fn get_all_reviews(&self) -> ServiceResult<Vec<Review>> {
        let reviews = self
            .repository
            .find_all()
            .await
            .map_err(store_error("Could not fetch reviews"))?;

        crate::info_with_trace!("Fetched {} reviews", reviews.len());
        Ok(reviews)
    }

    /// One page of reviews plus the cursor for the next one.
    ///
    /// The cursor is decoded before any store call, so a forged or
    /// truncated token never reaches the database.
    #[instrument(skip(self, cursor), fields(limit = ?limit))]
    pub async fn fetch_reviews_with_pagination(
        &self,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> ServiceResult<ReviewPage> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ServiceError::ValidationError {
                message: format!("limit must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }

        let start_after = cursor
            .filter(|token| !token.is_empty())
            .map(PageCursor::decode)
            .transpose()?
            .map(|cursor| cursor.last_id);

        let (reviews, last_id) = self
            .repository
            .find_page(limit, start_after)
            .await
            .map_err(store_error("Could not fetch reviews"))?;

        crate::info_with_trace!(
            has_more = last_id.is_some(),
            "Fetched page of {} reviews",
            reviews.len()
        );

        Ok(ReviewPage {
            reviews,
            next_cursor: last_id.map(|id| PageCursor::new(id).encode()),
        })
    }

    #[instrument(skip(self), fields(id = id))]
    pub async fn get_review_by_id(&self, id: u64) -> ServiceResult<Review> {
        self.repository
            .find_by_id(id)
            .await
            .map_err(store_error("Could not fetch review"))?
            .ok_or_else(|| {
                crate::warn_with_trace!("Review not found");
                ServiceError::NotFound {
                    entity: "Review",
                    id: id.to_string(),
                }
            })
    }

    /// Store a new review under the next free id and return that id
    #[instrument(skip(self, request), fields(author = %request.author))]
    pub async fn add_review(&self, request: CreateReviewRequest) -> ServiceResult<u64> {
        crate::info_with_trace!("Adding review");

        request.validate()?;

        let repository = &self.repository;
        let request = &request;
        let id = insert_with_next_id(
            "Review",
            move || repository.max_id(),
            move |id| repository.create(request.clone().into_review(id)),
            store_error("Could not add review"),
        )
        .await?;

        crate::info_with_trace!(id, "Review added");
        Ok(id)
    }

    /// Delete a review on behalf of `requested_by`, who must be its author.
    ///
    /// Comments and saved-list entries pointing at it are left in place.
    #[instrument(skip(self), fields(id = id, requested_by = %requested_by))]
    pub async fn delete_review(&self, id: u64, requested_by: &str) -> ServiceResult<()> {
        let review = self.get_review_by_id(id).await?;
        if review.author != requested_by {
            return Err(ServiceError::Forbidden {
                message: "Only the author can delete a review".to_string(),
            });
        }

        match self.repository.delete(id).await {
            Ok(()) => {
                crate::info_with_trace!("Review deleted");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(ServiceError::NotFound {
                entity: "Review",
                id: id.to_string(),
            }),
            Err(e) => Err(store_error("Could not delete review")(e)),
        }
    }

    /// Reviews written by `author`, optionally leaving one id out
    #[instrument(skip(self), fields(author = %author, exclude = ?exclude))]
    pub async fn get_reviews_by_author(
        &self,
        author: &str,
        exclude: Option<u64>,
    ) -> ServiceResult<Vec<Review>> {
        validate_user_id(author)?;

        let reviews = self
            .repository
            .find_by_author(author)
            .await
            .map_err(store_error("Could not fetch reviews"))?;

        Ok(reviews
            .into_iter()
            .filter(|review| Some(review.id) != exclude)
            .collect())
    }

    /// Case-insensitive substring search over title, content and author
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search_reviews(&self, query: &str) -> ServiceResult<Vec<Review>> {
        let reviews = self
            .repository
            .find_all()
            .await
            .map_err(store_error("Could not search reviews"))?;

        let matches: Vec<Review> = reviews
            .into_iter()
            .filter(|review| review.matches_query(query))
            .collect();

        crate::info_with_trace!("Search matched {} reviews", matches.len());
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryStore;
    use async_trait::async_trait;
    use mockall::mock;
    use rust_decimal_macros::dec;

    mock! {
        TestReviewRepository {}

        #[async_trait]
        impl ReviewRepository for TestReviewRepository {
            async fn find_all(&self) -> Result<Vec<Review>, RepositoryError>;
            async fn find_page(&self, limit: u32, start_after: Option<u64>) -> Result<(Vec<Review>, Option<u64>), RepositoryError>;
            async fn find_by_id(&self, id: u64) -> Result<Option<Review>, RepositoryError>;
            async fn find_by_author(&self, author: &str) -> Result<Vec<Review>, RepositoryError>;
            async fn max_id(&self) -> Result<Option<u64>, RepositoryError>;
            async fn create(&self, review: Review) -> Result<(), RepositoryError>;
            async fn delete(&self, id: u64) -> Result<(), RepositoryError>;
        }
    }

    fn create_request(author: &str, title: &str, content: &str) -> CreateReviewRequest {
        CreateReviewRequest {
            image_url: None,
            author: author.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            rate: dec!(4),
        }
    }

    async fn seeded_service() -> ReviewService {
        let service = ReviewService::new(Arc::new(InMemoryStore::new()));
        for (author, title, content) in [
            ("alice", "Cat cafe downtown", "Friendly staff"),
            ("bob", "Ramen night", "The broth had a CATchy aroma"),
            ("catherine", "Bakery", "Croissants"),
            ("alice", "Dog park", "Muddy"),
        ] {
            service
                .add_review(create_request(author, title, content))
                .await
                .unwrap();
        }
        service
    }

    #[tokio::test]
    async fn test_add_review_assigns_sequential_ids() {
        let service = ReviewService::new(Arc::new(InMemoryStore::new()));

        let first = service
            .add_review(create_request("alice", "One", "First"))
            .await
            .unwrap();
        let second = service
            .add_review(create_request("alice", "Two", "Second"))
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(service.get_review_by_id(2).await.unwrap().like, 0);
    }

    #[tokio::test]
    async fn test_add_review_continues_from_max() {
        let mut mock_repo = MockTestReviewRepository::new();
        mock_repo.expect_max_id().times(1).returning(|| Ok(Some(41)));
        mock_repo
            .expect_create()
            .withf(|review| review.id == 42 && review.like == 0)
            .times(1)
            .returning(|_| Ok(()));

        let service = ReviewService::new(Arc::new(mock_repo));
        let id = service
            .add_review(create_request("alice", "Title", "Body"))
            .await
            .unwrap();
        assert_eq!(id, 42);
    }

    #[tokio::test]
    async fn test_concurrent_adds_never_share_an_id() {
        let service = Arc::new(ReviewService::new(Arc::new(InMemoryStore::new())));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .add_review(create_request("alice", &format!("Review {}", i), "Body"))
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_across_fields() {
        let service = seeded_service().await;

        let mut ids: Vec<u64> = service
            .search_reviews("cat")
            .await
            .unwrap()
            .iter()
            .map(|review| review.id)
            .collect();
        ids.sort_unstable();

        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(service.search_reviews("").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_search_keeps_surrounding_whitespace_in_needle() {
        let service = seeded_service().await;
        service
            .add_review(create_request("dave", "Word games", "concatenate"))
            .await
            .unwrap();

        let hits = service.search_reviews("cat ").await.unwrap();
        let ids: Vec<u64> = hits.iter().map(|review| review.id).collect();

        // Only "Cat cafe downtown" has "cat" followed by a space
        assert_eq!(ids, vec![1]);
        assert!(service.search_reviews(" concatenate").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reviews_by_author_with_exclusion() {
        let service = seeded_service().await;

        let all = service.get_reviews_by_author("alice", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let others = service
            .get_reviews_by_author("alice", Some(1))
            .await
            .unwrap();
        assert_eq!(others.iter().map(|r| r.id).collect::<Vec<_>>(), vec![4]);
    }

    #[tokio::test]
    async fn test_pagination_walks_every_review_once() {
        let service = seeded_service().await;

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = service
                .fetch_reviews_with_pagination(Some(3), cursor.as_deref())
                .await
                .unwrap();
            seen.extend(page.reviews.iter().map(|r| r.id));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_pagination_rejects_bad_input_before_store() {
        let service = ReviewService::new(Arc::new(MockTestReviewRepository::new()));

        assert!(matches!(
            service.fetch_reviews_with_pagination(Some(0), None).await,
            Err(ServiceError::ValidationError { .. })
        ));
        assert!(matches!(
            service
                .fetch_reviews_with_pagination(Some(MAX_PAGE_SIZE + 1), None)
                .await,
            Err(ServiceError::ValidationError { .. })
        ));
        assert!(matches!(
            service
                .fetch_reviews_with_pagination(None, Some("%%%"))
                .await,
            Err(ServiceError::InvalidCursor)
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_author() {
        let service = seeded_service().await;

        assert!(matches!(
            service.delete_review(1, "bob").await,
            Err(ServiceError::Forbidden { .. })
        ));
        service.delete_review(1, "alice").await.unwrap();
        assert!(matches!(
            service.delete_review(1, "alice").await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_failure_message_is_fixed() {
        let mut mock_repo = MockTestReviewRepository::new();
        mock_repo.expect_find_all().returning(|| {
            Err(RepositoryError::AwsSdk {
                message: "internal detail".to_string(),
            })
        });

        let service = ReviewService::new(Arc::new(mock_repo));
        let err = service.get_all_reviews().await.unwrap_err();
        assert_eq!(err.to_string(), "Could not fetch reviews");
        assert!(!err.to_string().contains("internal detail"));
    }
}
