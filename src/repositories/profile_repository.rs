use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use tracing::{info, instrument, Instrument};

use super::dynamodb::{dynamodb_span, map_sdk_error, n, number_list, record_outcome, s};
use crate::models::RepositoryResult;

/// Trait defining the interface for profile (saved list) data access
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Append `review_id` to the saved list, creating the profile if needed.
    /// Returns the list after the append.
    async fn append_saved(&self, user_name: &str, review_id: u64) -> RepositoryResult<Vec<u64>>;

    /// The saved list, or `None` when no profile exists.
    async fn find_saved(&self, user_name: &str) -> RepositoryResult<Option<Vec<u64>>>;

    /// Remove the element at `index` only if it still equals `expected`.
    /// `ConditionFailed` when the list changed underneath the caller.
    async fn remove_saved_at(
        &self,
        user_name: &str,
        index: usize,
        expected: u64,
    ) -> RepositoryResult<()>;
}

/// DynamoDB implementation of the ProfileRepository trait
pub struct DynamoDbProfileRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbProfileRepository {
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
impl ProfileRepository for DynamoDbProfileRepository {
    #[instrument(skip(self), fields(table = %self.table_name, user_name = %user_name))]
    async fn append_saved(&self, user_name: &str, review_id: u64) -> RepositoryResult<Vec<u64>> {
        info!("Appending review to saved list");

        let update_span = dynamodb_span("UpdateItem", &self.table_name, &self.region);

        let response = async {
            let result = self
                .client
                .update_item()
                .table_name(&self.table_name)
                .key("userName", s(user_name))
                .update_expression(
                    "SET saved = list_append(if_not_exists(saved, :empty_list), :new_review_id)",
                )
                .expression_attribute_values(":empty_list", AttributeValue::L(Vec::new()))
                .expression_attribute_values(":new_review_id", AttributeValue::L(vec![n(review_id)]))
                .return_values(ReturnValue::UpdatedNew)
                .send()
                .await;
            record_outcome(&result);
            result.map_err(|e| map_sdk_error(e, &self.table_name))
        }
        .instrument(update_span)
        .await?;

        let attributes = response.attributes.unwrap_or_default();
        number_list(&attributes, "saved")
    }

    #[instrument(skip(self), fields(table = %self.table_name, user_name = %user_name))]
    async fn find_saved(&self, user_name: &str) -> RepositoryResult<Option<Vec<u64>>> {
        let get_span = dynamodb_span("GetItem", &self.table_name, &self.region);

        let response = async {
            let result = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("userName", s(user_name))
                .projection_expression("saved")
                .consistent_read(true)
                .send()
                .await;
            record_outcome(&result);
            result.map_err(|e| map_sdk_error(e, &self.table_name))
        }
        .instrument(get_span)
        .await?;

        response
            .item
            .as_ref()
            .map(|item| number_list(item, "saved"))
            .transpose()
    }

    #[instrument(skip(self), fields(table = %self.table_name, user_name = %user_name, index = index))]
    async fn remove_saved_at(
        &self,
        user_name: &str,
        index: usize,
        expected: u64,
    ) -> RepositoryResult<()> {
        info!("Removing saved review by position");

        let update_span = dynamodb_span("UpdateItem", &self.table_name, &self.region);

        async {
            // List indexes cannot be bound as values, so the position is
            // rendered into the expression; the condition pins its content.
            let result = self
                .client
                .update_item()
                .table_name(&self.table_name)
                .key("userName", s(user_name))
                .update_expression(format!("REMOVE #saved[{}]", index))
                .condition_expression(format!("#saved[{}] = :expected", index))
                .expression_attribute_names("#saved", "saved")
                .expression_attribute_values(":expected", n(expected))
                .send()
                .await;
            record_outcome(&result);
            result.map(|_| ()).map_err(|e| map_sdk_error(e, &self.table_name))
        }
        .instrument(update_span)
        .await
    }
}
