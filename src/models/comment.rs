use serde::{Deserialize, Serialize};

/// A comment on a review. `review_id` is not checked against the Reviews table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub author: String,
    pub content: String,
    #[serde(rename = "reviewId")]
    pub review_id: u64,
    #[serde(default)]
    pub like: u64,
}

/// Body of `POST /comments`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub author: String,
    pub content: String,
    #[serde(rename = "reviewId")]
    pub review_id: u64,
}

impl CreateCommentRequest {
    pub fn into_comment(self, id: u64) -> Comment {
        Comment {
            id,
            author: self.author,
            content: self.content,
            review_id: self.review_id,
            like: 0,
        }
    }
}
