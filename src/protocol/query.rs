//! Inner payload understood by the WinCC OA peer.
//!
//! The peer proxies each query to the WinCC OA REST API and replies with the
//! HTTP body as the frame's `response`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

// ============================================================================
// QueryMethod
// ============================================================================

/// HTTP-style verb for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryMethod {
    /// Read a resource.
    Get,
}

// ============================================================================
// Query
// ============================================================================

/// A query carried in a request frame's `message`.
///
/// # Format
///
/// ```json
/// { "type": "GET", "url": "http://localhost:3000/datapoints" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Verb.
    #[serde(rename = "type")]
    pub method: QueryMethod,

    /// Absolute target URL.
    pub url: String,
}

impl Query {
    /// Creates a GET query for `url`.
    #[inline]
    #[must_use]
    pub fn get(url: &Url) -> Self {
        Self {
            method: QueryMethod::Get,
            url: url.to_string(),
        }
    }

    /// Serializes the query into the opaque `message` string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_message(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
