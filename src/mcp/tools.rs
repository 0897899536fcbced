//! Datapoint tools exposed over MCP.
//!
//! Each tool builds a [`Query`], forwards it through a [`RemoteCall`] and
//! renders the peer's JSON answer as plain text. A failed call or an
//! unreadable answer is rendered as a "data unavailable" message instead of
//! an error, so the MCP client always gets the same response shape.
//!
//! | Tool | Arguments | Peer query |
//! |------|-----------|------------|
//! | `get-datapoint` | `datapointName` | `GET {base}datapoint/{name}` |
//! | `get-datapoints` | none | `GET {base}datapoints` |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::bridge::RemoteCall;
use crate::error::Result;
use crate::protocol::Query;

// ============================================================================
// Constants
// ============================================================================

/// Tool name: read one datapoint.
pub const GET_DATAPOINT: &str = "get-datapoint";

/// Tool name: list datapoint names.
pub const GET_DATAPOINTS: &str = "get-datapoints";

/// Placeholder for fields missing from the peer's answer.
const MISSING: &str = "undefined";

// ============================================================================
// Peer Payloads
// ============================================================================

/// Answer to a single-datapoint query.
///
/// Datapoint values may be any JSON type (numbers, booleans, strings).
#[derive(Debug, Clone, Default, Deserialize)]
struct DatapointResponse {
    datapoint: Option<Value>,
    value: Option<Value>,
}

/// Answer to the datapoint listing query.
#[derive(Debug, Clone, Deserialize)]
struct DatapointNamesResponse {
    datapoints: Vec<String>,
}

// ============================================================================
// ToolError
// ============================================================================

/// Errors in the tool invocation itself, as opposed to backend failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    /// No tool with this name.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments missing or of the wrong type.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

// ============================================================================
// DatapointTools
// ============================================================================

/// Tool invocation adapter for WinCC OA datapoints.
#[derive(Clone)]
pub struct DatapointTools {
    remote: Arc<dyn RemoteCall>,
    api_base: Url,
}

impl std::fmt::Debug for DatapointTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatapointTools")
            .field("api_base", &self.api_base.as_str())
            .finish_non_exhaustive()
    }
}

impl DatapointTools {
    /// Creates the adapter.
    ///
    /// `api_base` should end with `/` (as [`Config`](crate::Config) ensures)
    /// so that tool paths are appended rather than substituted.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteCall>, api_base: Url) -> Self {
        Self { remote, api_base }
    }

    /// Returns the MCP `tools/list` entries.
    #[must_use]
    pub fn definitions() -> Value {
        json!([
            {
                "name": GET_DATAPOINT,
                "description": "Get value for a datapoint",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "datapointName": {
                            "type": "string",
                            "description": "Name of the datapoint"
                        }
                    },
                    "required": ["datapointName"]
                }
            },
            {
                "name": GET_DATAPOINTS,
                "description": "Get names of datapoints",
                "inputSchema": {
                    "type": "object",
                    "properties": {}
                }
            }
        ])
    }

    /// Runs tool `name` with `arguments` and returns its text output.
    ///
    /// # Errors
    ///
    /// - [`ToolError::UnknownTool`] for an unrecognised name
    /// - [`ToolError::InvalidArguments`] if required arguments are missing
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &Value,
    ) -> std::result::Result<String, ToolError> {
        match name {
            GET_DATAPOINT => {
                let datapoint = arguments
                    .get("datapointName")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ToolError::InvalidArguments("datapointName must be a string".to_string())
                    })?;
                Ok(self.get_datapoint(datapoint).await)
            }
            GET_DATAPOINTS => Ok(self.get_datapoints().await),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// Reads one datapoint and formats it.
    pub async fn get_datapoint(&self, name: &str) -> String {
        let path = format!("datapoint/{}", urlencoding::encode(name));

        match self.fetch::<DatapointResponse>(&path).await {
            Some(data) => format!(
                "Name of the datapoint : {}:\nValue: {}",
                render(data.datapoint.as_ref()),
                render(data.value.as_ref()),
            ),
            None => format!(
                "Failed to retrieve data point data for name: {name}. \
                 This datapoint may not be exists."
            ),
        }
    }

    /// Lists datapoint names and formats them.
    pub async fn get_datapoints(&self) -> String {
        match self.fetch::<DatapointNamesResponse>("datapoints").await {
            Some(data) => data
                .datapoints
                .iter()
                .map(|name| format!("Datapoint name : {name}\n---"))
                .collect::<Vec<_>>()
                .join("\n"),
            None => "Failed to retrieve data point names".to_string(),
        }
    }

    /// Sends a GET query for `path` and parses the answer.
    ///
    /// Any failure is logged and collapsed to `None`.
    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        match self.try_fetch(path).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path, error = %e, "Peer query failed");
                None
            }
        }
    }

    async fn try_fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.api_base.join(path)?;
        let message = Query::get(&url).to_message()?;

        debug!(%url, "Querying peer");

        let response = self.remote.request(message).await?;
        Ok(serde_json::from_str(&response)?)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Renders a field of the peer's answer: strings bare, other JSON as text.
fn render(field: Option<&Value>) -> String {
    match field {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
