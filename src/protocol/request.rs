//! Request and response frames.
//!
//! One frame is one WebSocket message holding a single JSON object.

// ============================================================================
// Imports
// ============================================================================

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// RequestFrame
// ============================================================================

/// A call from local end to remote end.
///
/// # Format
///
/// ```json
/// { "id": "3f2a9c1b-1", "message": "{\"type\":\"GET\",\"url\":\"...\"}" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation id echoed back by the peer.
    pub id: RequestId,

    /// Opaque payload, usually a serialized [`Query`](super::Query).
    pub message: String,
}

impl RequestFrame {
    /// Creates a new request frame.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }

    /// Serializes the frame to its wire text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// ResponseFrame
// ============================================================================

/// A response from remote end to local end.
///
/// # Format
///
/// ```json
/// { "id": "3f2a9c1b-1", "response": "{\"datapoint\":\"System1:Pump.speed\",\"value\":\"42\"}" }
/// ```
///
/// `response` is handed back to the caller verbatim. Peers that send a JSON
/// object instead of a string are tolerated: the object is re-serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Opaque response payload.
    #[serde(deserialize_with = "string_or_json")]
    pub response: String,
}

impl ResponseFrame {
    /// Creates a new response frame.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, response: impl Into<String>) -> Self {
        Self {
            id,
            response: response.into(),
        }
    }

    /// Parses a response frame from wire text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the text is not a JSON object
    /// with string `id` and a `response` member.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::malformed_frame(e.to_string()))
    }
}

/// Accepts a JSON string as-is, or any other non-null JSON value re-serialized.
fn string_or_json<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Err(serde::de::Error::custom("response must not be null")),
        other => Ok(other.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
