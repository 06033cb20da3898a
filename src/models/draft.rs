use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Review;

/// An unpublished review. `rate` may be left empty until publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: u64,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none", default)]
    pub image_url: Option<String>,
    pub author: String,
    pub title: String,
    pub content: String,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub rate: Option<Decimal>,
}

impl Draft {
    /// Build the review that publishing this draft creates.
    ///
    /// A draft without a rating publishes with a rating of zero.
    pub fn to_review(&self, id: u64) -> Review {
        Review {
            id,
            image_url: self.image_url.clone(),
            author: self.author.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            rate: self.rate.unwrap_or(Decimal::ZERO),
            like: 0,
        }
    }
}

/// Body of `POST /drafts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDraftRequest {
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    pub author: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub rate: Option<Decimal>,
}

impl CreateDraftRequest {
    pub fn into_draft(self, id: u64) -> Draft {
        Draft {
            id,
            image_url: self.image_url,
            author: self.author,
            title: self.title,
            content: self.content,
            rate: self.rate,
        }
    }
}
