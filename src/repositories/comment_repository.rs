use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::dynamodb::{
    dynamodb_span, map_sdk_error, max_id, n, optional_n, record_outcome, required_n, required_s,
    s, scan_all, Item, ScanFilter,
};
use crate::models::{Comment, RepositoryError, RepositoryResult};

/// Trait defining the interface for comment data access operations
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn find_all(&self) -> RepositoryResult<Vec<Comment>>;

    async fn find_by_review_id(&self, review_id: u64) -> RepositoryResult<Vec<Comment>>;

    async fn max_id(&self) -> RepositoryResult<Option<u64>>;

    /// Insert a comment. `AlreadyExists` if the id is taken.
    async fn create(&self, comment: Comment) -> RepositoryResult<()>;
}

pub fn comment_to_item(comment: &Comment) -> Item {
    let mut item = Item::new();
    item.insert("id".to_string(), n(comment.id));
    item.insert("author".to_string(), s(&comment.author));
    item.insert("content".to_string(), s(&comment.content));
    item.insert("reviewId".to_string(), n(comment.review_id));
    item.insert("like".to_string(), n(comment.like));
    item
}

pub fn item_to_comment(item: &Item) -> RepositoryResult<Comment> {
    Ok(Comment {
        id: required_n(item, "id")?,
        author: required_s(item, "author")?,
        content: required_s(item, "content")?,
        review_id: required_n(item, "reviewId")?,
        like: optional_n(item, "like").unwrap_or(0),
    })
}

fn parse_comments(items: &[Item]) -> Vec<Comment> {
    items
        .iter()
        .filter_map(|item| match item_to_comment(item) {
            Ok(comment) => Some(comment),
            Err(e) => {
                warn!("Failed to parse comment item: {}", e);
                None
            }
        })
        .collect()
}

/// DynamoDB implementation of the CommentRepository trait
pub struct DynamoDbCommentRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbCommentRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }
}

#[async_trait]
impl CommentRepository for DynamoDbCommentRepository {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_all(&self) -> RepositoryResult<Vec<Comment>> {
        let items = scan_all(&self.client, &self.table_name, &self.region, None, None).await?;
        let comments = parse_comments(&items);

        info!("Found {} comments", comments.len());
        Ok(comments)
    }

    #[instrument(skip(self), fields(table = %self.table_name, review_id = review_id))]
    async fn find_by_review_id(&self, review_id: u64) -> RepositoryResult<Vec<Comment>> {
        let filter = ScanFilter::equals("reviewId", n(review_id));
        let items = scan_all(
            &self.client,
            &self.table_name,
            &self.region,
            Some(&filter),
            None,
        )
        .await?;

        Ok(parse_comments(&items))
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

    #[instrument(skip(self, comment), fields(table = %self.table_name, id = comment.id))]
    async fn create(&self, comment: Comment) -> RepositoryResult<()> {
        let put_span = dynamodb_span("PutItem", &self.table_name, &self.region);

        async {
            let result = self
                .client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(comment_to_item(&comment)))
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
}
