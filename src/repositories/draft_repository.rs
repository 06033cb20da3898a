use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::dynamodb::{
    dynamodb_span, failed_conditions, map_sdk_error, max_id, n, optional_n, optional_s,
    record_outcome, required_n, required_s, s, scan_all, Item, ScanFilter,
};
use super::review_repository::review_to_item;
use crate::models::{Draft, RepositoryError, RepositoryResult, Review};

/// Trait defining the interface for draft data access operations
#[async_trait]
pub trait DraftRepository: Send + Sync {
    async fn find_by_id(&self, id: u64) -> RepositoryResult<Option<Draft>>;

    async fn find_by_author(&self, author: &str) -> RepositoryResult<Vec<Draft>>;

    async fn max_id(&self) -> RepositoryResult<Option<u64>>;

    /// Insert a draft. `AlreadyExists` if the id is taken.
    async fn create(&self, draft: Draft) -> RepositoryResult<()>;

    /// Atomically insert `review` and delete the draft.
    ///
    /// `AlreadyExists` when the review id is taken, `NotFound` when the
    /// draft no longer exists. Neither write happens on failure.
    async fn publish(&self, draft_id: u64, review: Review) -> RepositoryResult<()>;
}

pub fn draft_to_item(draft: &Draft) -> Item {
    let mut item = Item::new();
    item.insert("id".to_string(), n(draft.id));
    if let Some(url) = &draft.image_url {
        item.insert("imageUrl".to_string(), s(url));
    }
    item.insert("author".to_string(), s(&draft.author));
    item.insert("title".to_string(), s(&draft.title));
    item.insert("content".to_string(), s(&draft.content));
    item.insert(
        "rate".to_string(),
        match draft.rate {
            Some(rate) => n(rate),
            None => AttributeValue::Null(true),
        },
    );
    item
}

pub fn item_to_draft(item: &Item) -> RepositoryResult<Draft> {
    Ok(Draft {
        id: required_n(item, "id")?,
        image_url: optional_s(item, "imageUrl"),
        author: required_s(item, "author")?,
        title: optional_s(item, "title").unwrap_or_default(),
        content: optional_s(item, "content").unwrap_or_default(),
        rate: optional_n::<Decimal>(item, "rate"),
    })
}

/// DynamoDB implementation of the DraftRepository trait.
///
/// Publishing writes to the Reviews table, so the repository knows both.
pub struct DynamoDbDraftRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    reviews_table_name: String,
    region: String,
}

impl DynamoDbDraftRepository {
    pub fn new(
        client: Arc<DynamoDbClient>,
        table_name: String,
        reviews_table_name: String,
        region: String,
    ) -> Self {
        Self {
            client,
            table_name,
            reviews_table_name,
            region,
        }
    }
}

#[async_trait]
impl DraftRepository for DynamoDbDraftRepository {
    #[instrument(skip(self), fields(table = %self.table_name, id = id))]
    async fn find_by_id(&self, id: u64) -> RepositoryResult<Option<Draft>> {
        let get_span = dynamodb_span("GetItem", &self.table_name, &self.region);

        let response = async {
            let result = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("id", n(id))
                .consistent_read(true)
                .send()
                .await;
            record_outcome(&result);
            result.map_err(|e| map_sdk_error(e, &self.table_name))
        }
        .instrument(get_span)
        .await?;

        response.item.as_ref().map(item_to_draft).transpose()
    }

    #[instrument(skip(self), fields(table = %self.table_name, author = %author))]
    async fn find_by_author(&self, author: &str) -> RepositoryResult<Vec<Draft>> {
        let filter = ScanFilter::equals("author", s(author));
        let items = scan_all(
            &self.client,
            &self.table_name,
            &self.region,
            Some(&filter),
            None,
        )
        .await?;

        let drafts: Vec<Draft> = items
            .iter()
            .filter_map(|item| match item_to_draft(item) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    warn!("Failed to parse draft item: {}", e);
                    None
                }
            })
            .collect();

        info!("Found {} drafts", drafts.len());
        Ok(drafts)
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

    #[instrument(skip(self, draft), fields(table = %self.table_name, id = draft.id))]
    async fn create(&self, draft: Draft) -> RepositoryResult<()> {
        let put_span = dynamodb_span("PutItem", &self.table_name, &self.region);

        async {
            let result = self
                .client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(draft_to_item(&draft)))
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

    #[instrument(skip(self, review), fields(table = %self.table_name, draft_id = draft_id, review_id = review.id))]
    async fn publish(&self, draft_id: u64, review: Review) -> RepositoryResult<()> {
        info!("Publishing draft");

        let build_error = |e: aws_sdk_dynamodb::error::BuildError| RepositoryError::AwsSdk {
            message: format!("Failed to build transaction: {}", e),
        };

        let put_review = Put::builder()
            .table_name(&self.reviews_table_name)
            .set_item(Some(review_to_item(&review)))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(build_error)?;

        let delete_draft = Delete::builder()
            .table_name(&self.table_name)
            .key("id", n(draft_id))
            .condition_expression("attribute_exists(id)")
            .build()
            .map_err(build_error)?;

        let transact_span = dynamodb_span("TransactWriteItems", &self.table_name, &self.region);

        async {
            let result = self
                .client
                .transact_write_items()
                .transact_items(TransactWriteItem::builder().put(put_review).build())
                .transact_items(TransactWriteItem::builder().delete(delete_draft).build())
                .send()
                .await;
            record_outcome(&result);

            match result {
                Ok(_) => Ok(()),
                Err(e) => match failed_conditions(&e) {
                    // Item 1 is the draft delete: someone published or removed it first.
                    Some(failed) if failed.contains(&1) => Err(RepositoryError::NotFound),
                    Some(_) => Err(RepositoryError::AlreadyExists),
                    None => Err(map_sdk_error(e, &self.table_name)),
                },
            }
        }
        .instrument(transact_span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_draft_without_rate_stores_null() {
        let draft = Draft {
            id: 2,
            image_url: None,
            author: "alice".to_string(),
            title: "Half done".to_string(),
            content: String::new(),
            rate: None,
        };

        let item = draft_to_item(&draft);
        assert_eq!(item.get("rate"), Some(&AttributeValue::Null(true)));
        assert_eq!(item_to_draft(&item).unwrap(), draft);
    }

    #[test]
    fn test_draft_with_rate_round_trips() {
        let draft = Draft {
            id: 5,
            image_url: Some("https://img.example/5.png".to_string()),
            author: "alice".to_string(),
            title: "Done".to_string(),
            content: "All of it".to_string(),
            rate: Some(dec!(3.5)),
        };

        assert_eq!(item_to_draft(&draft_to_item(&draft)).unwrap(), draft);
    }
}
