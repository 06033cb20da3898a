use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::ServiceError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Position in the Reviews scan, handed to clients as an opaque token.
///
/// The token is URL-safe base64 of the JSON-encoded last evaluated key,
/// so clients never construct store keys themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    #[serde(rename = "id")]
    pub last_id: u64,
}

impl PageCursor {
    pub fn new(last_id: u64) -> Self {
        Self { last_id }
    }

    pub fn encode(&self) -> String {
        // Serializing a struct with a single integer field cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, ServiceError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| ServiceError::InvalidCursor)?;
        serde_json::from_slice(&bytes).map_err(|_| ServiceError::InvalidCursor)
    }
}
