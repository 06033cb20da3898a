use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::dynamodb::{
    dynamodb_span, map_sdk_error, max_id, n, optional_n, optional_s, record_outcome, required_n,
    required_s, s, scan_all, Item, ScanFilter,
};
use crate::models::{RepositoryError, RepositoryResult, Review};

/// Trait defining the interface for review data access operations
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn find_all(&self) -> RepositoryResult<Vec<Review>>;

    /// One scan page of at most `limit` reviews starting after `start_after`.
    /// Also returns the last evaluated id when more items may follow.
    async fn find_page(
        &self,
        limit: u32,
        start_after: Option<u64>,
    ) -> RepositoryResult<(Vec<Review>, Option<u64>)>;

    async fn find_by_id(&self, id: u64) -> RepositoryResult<Option<Review>>;

    async fn find_by_author(&self, author: &str) -> RepositoryResult<Vec<Review>>;

    /// Highest id in the table, `None` when empty
    async fn max_id(&self) -> RepositoryResult<Option<u64>>;

    /// Insert a review. `AlreadyExists` if the id is taken.
    async fn create(&self, review: Review) -> RepositoryResult<()>;

    /// Delete by id. `NotFound` if there was nothing to delete.
    async fn delete(&self, id: u64) -> RepositoryResult<()>;
}

/// Convert a Review struct to DynamoDB attribute values
pub fn review_to_item(review: &Review) -> Item {
    let mut item = Item::new();
    item.insert("id".to_string(), n(review.id));
    if let Some(url) = &review.image_url {
        item.insert("imageUrl".to_string(), s(url));
    }
    item.insert("author".to_string(), s(&review.author));
    item.insert("title".to_string(), s(&review.title));
    item.insert("content".to_string(), s(&review.content));
    item.insert("rate".to_string(), n(review.rate));
    item.insert("like".to_string(), n(review.like));
    item
}

/// Convert DynamoDB item to Review struct
pub fn item_to_review(item: &Item) -> RepositoryResult<Review> {
    Ok(Review {
        id: required_n(item, "id")?,
        image_url: optional_s(item, "imageUrl"),
        author: required_s(item, "author")?,
        title: required_s(item, "title")?,
        content: required_s(item, "content")?,
        // Reviews published from unrated drafts carry a NULL rate
        rate: optional_n::<Decimal>(item, "rate").unwrap_or(Decimal::ZERO),
        like: optional_n(item, "like").unwrap_or(0),
    })
}

fn parse_reviews(items: &[Item]) -> Vec<Review> {
    items
        .iter()
        .filter_map(|item| match item_to_review(item) {
            Ok(review) => Some(review),
            Err(e) => {
                warn!("Failed to parse review item: {}", e);
                None
            }
        })
        .collect()
}

/// DynamoDB implementation of the ReviewRepository trait
pub struct DynamoDbReviewRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbReviewRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait]
impl ReviewRepository for DynamoDbReviewRepository {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_all(&self) -> RepositoryResult<Vec<Review>> {
        info!("Scanning all reviews");

        let items = scan_all(&self.client, &self.table_name, &self.region, None, None).await?;
        let reviews = parse_reviews(&items);

        info!("Found {} reviews", reviews.len());
        Ok(reviews)
    }

    #[instrument(skip(self), fields(table = %self.table_name, limit = limit))]
    async fn find_page(
        &self,
        limit: u32,
        start_after: Option<u64>,
    ) -> RepositoryResult<(Vec<Review>, Option<u64>)> {
        let scan_span = dynamodb_span("Scan", &self.table_name, &self.region);

        let start_key = start_after.map(|id| Item::from([("id".to_string(), n(id))]));
        let limit = i32::try_from(limit).map_err(|_| RepositoryError::InvalidItem {
            message: format!("Scan limit {} out of range", limit),
        })?;

        let response = async {
            let result = self
                .client
                .scan()
                .table_name(&self.table_name)
                .limit(limit)
                .set_exclusive_start_key(start_key)
                .send()
                .await;
            record_outcome(&result);
            result.map_err(|e| map_sdk_error(e, &self.table_name))
        }
        .instrument(scan_span)
        .await?;

        let reviews = parse_reviews(response.items());
        let last_id = response
            .last_evaluated_key()
            .and_then(|key| optional_n::<u64>(key, "id"));

        info!("Fetched page of {} reviews", reviews.len());
        Ok((reviews, last_id))
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = id))]
    async fn find_by_id(&self, id: u64) -> RepositoryResult<Option<Review>> {
        let get_span = dynamodb_span("GetItem", &self.table_name, &self.region);

        let response = async {
            let result = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("id", n(id))
                .send()
                .await;
            record_outcome(&result);
            result.map_err(|e| map_sdk_error(e, &self.table_name))
        }
        .instrument(get_span)
        .await?;

        response.item.as_ref().map(item_to_review).transpose()
    }

    #[instrument(skip(self), fields(table = %self.table_name, author = %author))]
    async fn find_by_author(&self, author: &str) -> RepositoryResult<Vec<Review>> {
        let filter = ScanFilter::equals("author", s(author));
        let items = scan_all(
            &self.client,
            &self.table_name,
            &self.region,
            Some(&filter),
            None,
        )
        .await?;

        Ok(parse_reviews(&items))
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn max_id(&self) -> RepositoryResult<Option<u64>> {
        let items = scan_all(
            &self.client,
            &self.table_name,
            &self.region,
            None,
            Some("id"),
        )
        .await?;

        Ok(max_id(&items))
    }

    #[instrument(skip(self, review), fields(table = %self.table_name, id = review.id))]
    async fn create(&self, review: Review) -> RepositoryResult<()> {
        info!("Creating review");

        let put_span = dynamodb_span("PutItem", &self.table_name, &self.region);

        async {
            let result = self
                .client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(review_to_item(&review)))
                .condition_expression("attribute_not_exists(id)")
                .send()
                .await;
            record_outcome(&result);
            result.map(|_| ()).map_err(|e| match map_sdk_error(e, &self.table_name) {
                RepositoryError::ConditionFailed => RepositoryError::AlreadyExists,
                other => other,
            })
        }
        .instrument(put_span)
        .await
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = id))]
    async fn delete(&self, id: u64) -> RepositoryResult<()> {
        info!("Deleting review");

        let delete_span = dynamodb_span("DeleteItem", &self.table_name, &self.region);

        async {
            let result = self
                .client
                .delete_item()
                .table_name(&self.table_name)
                .key("id", n(id))
                .condition_expression("attribute_exists(id)")
                .send()
                .await;
            record_outcome(&result);
            result.map(|_| ()).map_err(|e| match map_sdk_error(e, &self.table_name) {
                RepositoryError::ConditionFailed => RepositoryError::NotFound,
                other => other,
            })
        }
        .instrument(delete_span)
        .await
    }
}
