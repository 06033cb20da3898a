use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem, Update};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::dynamodb::{
    dynamodb_span, failed_conditions, map_sdk_error, optional_s, record_outcome, required_s, s,
    scan_all, Item,
};
use crate::models::{RepositoryError, RepositoryResult, User};

/// Trait defining the interface for user data access operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Scan every user
    async fn find_all(&self) -> RepositoryResult<Vec<User>>;

    /// Find a user by `UserId`
    async fn find_by_id(&self, user_id: &str) -> RepositoryResult<Option<User>>;

    /// Create the user together with an empty profile.
    ///
    /// Fails with `AlreadyExists` when the `UserId` is taken; nothing is
    /// written in that case.
    async fn create_with_profile(&self, user: User) -> RepositoryResult<()>;

    /// Replace the pending confirmation code. `NotFound` if the user is gone.
    async fn set_confirmation_code(&self, user_id: &str, code: &str) -> RepositoryResult<()>;

    /// Mark the user confirmed if `code` matches the stored code.
    /// `ConditionFailed` when it does not.
    async fn confirm(&self, user_id: &str, code: &str) -> RepositoryResult<()>;
}

/// DynamoDB implementation of the UserRepository trait
pub struct DynamoDbUserRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    profiles_table_name: String,
    region: String,
}

impl DynamoDbUserRepository {
    pub fn new(
        client: Arc<DynamoDbClient>,
        table_name: String,
        profiles_table_name: String,
        region: String,
    ) -> Self {
        Self {
            client,
            table_name,
            profiles_table_name,
            region,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Convert a User struct to DynamoDB attribute values
    pub fn user_to_item(&self, user: &User) -> Item {
        let mut item = Item::new();
        item.insert("UserId".to_string(), s(&user.user_id));
        item.insert("PasswordHash".to_string(), s(&user.password_hash));
        item.insert("Confirmed".to_string(), AttributeValue::Bool(user.confirmed));
        if let Some(code) = &user.confirmation_code {
            item.insert("ConfirmationCode".to_string(), s(code));
        }
        item
    }

    /// Convert DynamoDB item to User struct
    pub fn item_to_user(&self, item: &Item) -> RepositoryResult<User> {
        Ok(User {
            user_id: required_s(item, "UserId")?,
            password_hash: required_s(item, "PasswordHash")?,
            confirmed: item
                .get("Confirmed")
                .and_then(|v| v.as_bool().ok())
                .copied()
                .unwrap_or(false),
            confirmation_code: optional_s(item, "ConfirmationCode"),
        })
    }
}

#[async_trait]
impl UserRepository for DynamoDbUserRepository {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_all(&self) -> RepositoryResult<Vec<User>> {
        info!("Scanning all users");

        let items = scan_all(&self.client, &self.table_name, &self.region, None, None).await?;

        let mut users = Vec::with_capacity(items.len());
        for item in &items {
            match self.item_to_user(item) {
                Ok(user) => users.push(user),
                Err(e) => warn!("Failed to parse user item: {}", e),
            }
        }

        info!("Found {} users", users.len());
        Ok(users)
    }

    #[instrument(skip(self), fields(table = %self.table_name, user_id = %user_id))]
    async fn find_by_id(&self, user_id: &str) -> RepositoryResult<Option<User>> {
        let get_span = dynamodb_span("GetItem", &self.table_name, &self.region);

        let response = async {
            let result = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("UserId", s(user_id))
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
            .map(|item| self.item_to_user(item))
            .transpose()
    }

    #[instrument(skip(self, user), fields(table = %self.table_name, user_id = %user.user_id))]
    async fn create_with_profile(&self, user: User) -> RepositoryResult<()> {
        info!("Creating user and profile");

        let build_error = |e: aws_sdk_dynamodb::error::BuildError| RepositoryError::AwsSdk {
            message: format!("Failed to build transaction: {}", e),
        };

        let put_user = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(self.user_to_item(&user)))
            .condition_expression("attribute_not_exists(UserId)")
            .build()
            .map_err(build_error)?;

        // Leaves an existing profile's saved list untouched.
        let ensure_profile = Update::builder()
            .table_name(&self.profiles_table_name)
            .key("userName", s(&user.user_id))
            .update_expression("SET saved = if_not_exists(saved, :empty_list)")
            .expression_attribute_values(":empty_list", AttributeValue::L(Vec::new()))
            .build()
            .map_err(build_error)?;

        let transact_span = dynamodb_span("TransactWriteItems", &self.table_name, &self.region);

        async {
            let result = self
                .client
                .transact_write_items()
                .transact_items(TransactWriteItem::builder().put(put_user).build())
                .transact_items(TransactWriteItem::builder().update(ensure_profile).build())
                .send()
                .await;
            record_outcome(&result);

            match result {
                Ok(_) => Ok(()),
                Err(e) => match failed_conditions(&e) {
                    Some(_) => {
                        info!("User already exists");
                        Err(RepositoryError::AlreadyExists)
                    }
                    None => Err(map_sdk_error(e, &self.table_name)),
                },
            }
        }
        .instrument(transact_span)
        .await
    }

    #[instrument(skip(self, code), fields(table = %self.table_name, user_id = %user_id))]
    async fn set_confirmation_code(&self, user_id: &str, code: &str) -> RepositoryResult<()> {
        let update_span = dynamodb_span("UpdateItem", &self.table_name, &self.region);

        async {
            let result = self
                .client
                .update_item()
                .table_name(&self.table_name)
                .key("UserId", s(user_id))
                .update_expression("SET ConfirmationCode = :code")
                .condition_expression("attribute_exists(UserId)")
                .expression_attribute_values(":code", s(code))
                .send()
                .await;
            record_outcome(&result);
            result.map(|_| ()).map_err(|e| match map_sdk_error(e, &self.table_name) {
                RepositoryError::ConditionFailed => RepositoryError::NotFound,
                other => other,
            })
        }
        .instrument(update_span)
        .await
    }

    #[instrument(skip(self, code), fields(table = %self.table_name, user_id = %user_id))]
    async fn confirm(&self, user_id: &str, code: &str) -> RepositoryResult<()> {
        let update_span = dynamodb_span("UpdateItem", &self.table_name, &self.region);

        async {
            let result = self
                .client
                .update_item()
                .table_name(&self.table_name)
                .key("UserId", s(user_id))
                .update_expression("SET Confirmed = :confirmed REMOVE ConfirmationCode")
                .condition_expression("attribute_exists(UserId) AND ConfirmationCode = :code")
                .expression_attribute_values(":confirmed", AttributeValue::Bool(true))
                .expression_attribute_values(":code", s(code))
                .send()
                .await;
            record_outcome(&result);
            result.map(|_| ()).map_err(|e| map_sdk_error(e, &self.table_name))
        }
        .instrument(update_span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> DynamoDbUserRepository {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        let client = Arc::new(aws_sdk_dynamodb::Client::from_conf(config));
        DynamoDbUserRepository::new(
            client,
            "Users".to_string(),
            "Profiles".to_string(),
            "us-east-1".to_string(),
        )
    }

    #[test]
    fn test_user_item_round_trip() {
        let repo = repository();
        let user = User {
            user_id: "alice".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            confirmed: false,
            confirmation_code: Some("123456".to_string()),
        };

        let item = repo.user_to_item(&user);
        assert!(item.contains_key("PasswordHash"));
        assert!(!item.contains_key("Password"));
        assert_eq!(repo.item_to_user(&item).unwrap(), user);
    }

    #[test]
    fn test_item_without_confirmed_flag_defaults_to_unconfirmed() {
        let repo = repository();
        let mut item = Item::new();
        item.insert("UserId".to_string(), s("bob"));
        item.insert("PasswordHash".to_string(), s("$2b$04$hash"));

        let user = repo.item_to_user(&item).unwrap();
        assert!(!user.confirmed);
        assert_eq!(user.confirmation_code, None);
    }

    #[test]
    fn test_item_missing_hash_is_rejected() {
        let repo = repository();
        let mut item = Item::new();
        item.insert("UserId".to_string(), s("bob"));

        assert!(matches!(
            repo.item_to_user(&item),
            Err(RepositoryError::InvalidItem { .. })
        ));
    }
}
