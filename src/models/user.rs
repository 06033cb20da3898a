use serde::{Deserialize, Serialize};

/// A registered account as persisted in the Users table.
///
/// Only a salted bcrypt hash of the password is ever stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub confirmation_code: Option<String>,
}

impl User {
    pub fn to_summary(&self) -> UserSummary {
        UserSummary {
            user_id: self.user_id.clone(),
            confirmed: self.confirmed,
        }
    }
}

/// Public view of a user, safe to return from the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "UserId")]
    pub user_id: String,
    #[serde(rename = "Confirmed")]
    pub confirmed: bool,
}

/// Body of `/users/register` and `/users/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    #[serde(rename = "UserId")]
    pub user_id: String,
    #[serde(rename = "Password")]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRegistrationRequest {
    #[serde(rename = "UserId")]
    pub user_id: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendConfirmationRequest {
    #[serde(rename = "UserId")]
    pub user_id: String,
}

/// Success/failure envelope returned by write operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<u64>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            id: None,
        }
    }

    pub fn created(message: impl Into<String>, id: u64) -> Self {
        Self {
            success: true,
            message: message.into(),
            id: Some(id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
}
