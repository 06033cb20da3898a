use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::dynamodb::map_sdk_error;
use crate::models::{RepositoryError, RepositoryResult};

/// Names of the five tables backing the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub users: String,
    pub profiles: String,
    pub reviews: String,
    pub comments: String,
    pub drafts: String,
}

/// Something that can make sure the storage layout exists
#[async_trait]
pub trait TableProvisioner: Send + Sync {
    /// Create every missing table and return the names that were created
    async fn ensure_tables(&self) -> RepositoryResult<Vec<String>>;
}

/// Manages DynamoDB table creation
pub struct TableManager {
    client: Arc<DynamoDbClient>,
    tables: TableNames,
}

fn build_error(e: aws_sdk_dynamodb::error::BuildError) -> RepositoryError {
    RepositoryError::AwsSdk {
        message: format!("Failed to build table definition: {}", e),
    }
}

impl TableManager {
    pub fn new(client: Arc<DynamoDbClient>, tables: TableNames) -> Self {
        Self { client, tables }
    }

    /// Key attribute and type for each table
    fn key_layout(&self) -> [(&str, &'static str, ScalarAttributeType); 5] {
        [
            (&self.tables.users, "UserId", ScalarAttributeType::S),
            (&self.tables.profiles, "userName", ScalarAttributeType::S),
            (&self.tables.reviews, "id", ScalarAttributeType::N),
            (&self.tables.comments, "id", ScalarAttributeType::N),
            (&self.tables.drafts, "id", ScalarAttributeType::N),
        ]
    }

    /// Create a table with a single hash key. Returns false if it already existed.
    #[instrument(skip(self, key_type), fields(table_name = %table_name, key = %key_name))]
    pub async fn create_table(
        &self,
        table_name: &str,
        key_name: &str,
        key_type: ScalarAttributeType,
    ) -> RepositoryResult<bool> {
        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(false);
        }

        info!("Creating table");

        let attribute_definition = AttributeDefinition::builder()
            .attribute_name(key_name)
            .attribute_type(key_type)
            .build()
            .map_err(build_error)?;

        let key_schema = KeySchemaElement::builder()
            .attribute_name(key_name)
            .key_type(KeyType::Hash)
            .build()
            .map_err(build_error)?;

        self.client
            .create_table()
            .table_name(table_name)
            .attribute_definitions(attribute_definition)
            .key_schema(key_schema)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, table_name))?;

        info!("Table creation initiated, waiting for table to become active");
        self.wait_for_table_active(table_name).await?;
        info!("Table {} created successfully", table_name);

        Ok(true)
    }

    /// Check if a table exists
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        match self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match map_sdk_error(e, table_name) {
                RepositoryError::TableNotFound { .. } => {
                    info!("Table {} does not exist", table_name);
                    Ok(false)
                }
                other => {
                    error!("Error checking table existence: {}", other);
                    Err(other)
                }
            },
        }
    }

    /// Wait for a table to become active
    #[instrument(skip(self), fields(table_name = %table_name))]
    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        let max_attempts = 30;
        let wait_duration = Duration::from_secs(2);

        for _ in 0..max_attempts {
            let response = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, table_name))?;

            match response.table.and_then(|table| table.table_status) {
                Some(TableStatus::Active) => {
                    info!("Table {} is now active", table_name);
                    return Ok(());
                }
                Some(status) => info!("Table {} status: {:?}, waiting...", table_name, status),
                None => warn!("Table {} status unknown, waiting...", table_name),
            }

            tokio::time::sleep(wait_duration).await;
        }

        error!("Timeout waiting for table {} to become active", table_name);
        Err(RepositoryError::Timeout)
    }
}

#[async_trait]
impl TableProvisioner for TableManager {
    #[instrument(skip(self))]
    async fn ensure_tables(&self) -> RepositoryResult<Vec<String>> {
        info!("Ensuring all tables exist");

        let mut created = Vec::new();
        for (table_name, key_name, key_type) in self.key_layout() {
            if self.create_table(table_name, key_name, key_type).await? {
                created.push(table_name.to_string());
            }
        }

        info!("{} tables created", created.len());
        Ok(created)
    }
}
