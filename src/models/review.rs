use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A published review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none", default)]
    pub image_url: Option<String>,
    pub author: String,
    pub title: String,
    pub content: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    #[serde(default)]
    pub like: u64,
}

impl Review {
    /// Case-insensitive substring match on title, content and author.
    ///
    /// An empty query matches every review.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
            || self.author.to_lowercase().contains(&needle)
    }
}

/// Body of `POST /reviews`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReviewRequest {
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    pub author: String,
    pub title: String,
    pub content: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
}

impl CreateReviewRequest {
    pub fn into_review(self, id: u64) -> Review {
        Review {
            id,
            image_url: self.image_url,
            author: self.author,
            title: self.title,
            content: self.content,
            rate: self.rate,
            like: 0,
        }
    }
}

/// One page of a paginated scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    /// Opaque token for the next page; `None` once the table is exhausted
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorQuery {
    pub exclude: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn review(title: &str, content: &str, author: &str) -> Review {
        Review {
            id: 1,
            image_url: None,
            author: author.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            rate: dec!(4.5),
            like: 0,
        }
    }

    #[test]
    fn test_matches_query_is_case_insensitive() {
        assert!(review("My CAT", "", "bob").matches_query("cat"));
        assert!(review("", "concatenate", "bob").matches_query("CAT"));
        assert!(review("", "", "Catherine").matches_query("cat"));
        assert!(!review("Dog days", "woof", "bob").matches_query("cat"));
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(review("a", "b", "c").matches_query(""));
    }

    #[test]
    fn test_rate_serializes_as_number() {
        let json = serde_json::to_value(review("t", "c", "a")).unwrap();
        assert_eq!(json["rate"], serde_json::json!(4.5));
        assert_eq!(json["like"], 0);
        assert!(json.get("imageUrl").is_none());
    }

    #[test]
    fn test_into_review_starts_with_zero_likes() {
        let request = CreateReviewRequest {
            image_url: Some("https://img.example/1.png".to_string()),
            author: "alice".to_string(),
            title: "Title".to_string(),
            content: "Content".to_string(),
            rate: dec!(3),
        };

        let review = request.into_review(12);
        assert_eq!(review.id, 12);
        assert_eq!(review.like, 0);
        assert_eq!(review.image_url.as_deref(), Some("https://img.example/1.png"));
    }
}
