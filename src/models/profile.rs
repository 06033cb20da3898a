use serde::{Deserialize, Serialize};

/// Per-user bookmark list, keyed by `userName` in the Profiles table.
///
/// `saved` keeps insertion order and may contain duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(default)]
    pub saved: Vec<u64>,
}

impl Profile {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            saved: Vec::new(),
        }
    }

    /// Position of the first occurrence of `review_id`
    pub fn position_of(&self, review_id: u64) -> Option<usize> {
        self.saved.iter().position(|id| *id == review_id)
    }
}

/// Body of `/users/save` and `/users/unsave`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReviewRequest {
    pub username: String,
    #[serde(rename = "reviewId")]
    pub review_id: u64,
}

/// Body of `/users/saved`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedReviewsRequest {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedReviewsResponse {
    pub saved: Vec<u64>,
}
