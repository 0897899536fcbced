//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! Each input line is one request. Requests are handled on their own tasks,
//! so a slow tool call does not hold up the ones behind it; responses are
//! written by a single writer task, one per line, in completion order.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::Result;

use super::jsonrpc::{INVALID_REQUEST, JsonRpcRequest, JsonRpcResponse, PARSE_ERROR};
use super::server::McpServer;

// ============================================================================
// Public API
// ============================================================================

/// Serves MCP on the process's stdin/stdout until stdin reaches EOF.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if stdin or stdout fail.
pub async fn serve_stdio(server: Arc<McpServer>) -> Result<()> {
    info!("Serving MCP on stdio");
    serve(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Serves MCP on an arbitrary line reader and writer until `reader` ends.
///
/// Waits for in-flight requests to finish writing before returning.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if reading or writing fails.
pub async fn serve<R, W>(server: Arc<McpServer>, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, out_rx));

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request = match decode(line) {
            Ok(request) => request,
            Err(response) => {
                enqueue(&out_tx, &response);
                continue;
            }
        };

        let server = Arc::clone(&server);
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            if let Some(response) = server.handle_request(request).await {
                enqueue(&out_tx, &response);
            }
        });
    }

    debug!("Input closed, draining responses");

    // The writer stops once every spawned handler has dropped its sender.
    drop(out_tx);
    writer_task.await.map_err(std::io::Error::other)??;

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Decodes one line, or builds the error response for it.
fn decode(line: &str) -> std::result::Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        warn!(error = %e, "Unparseable MCP message");
        JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {e}"))
    })?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);

    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "Invalid MCP request");
        JsonRpcResponse::error(id, INVALID_REQUEST, format!("invalid request: {e}"))
    })
}

/// Serializes `response` and hands it to the writer.
fn enqueue(out_tx: &mpsc::UnboundedSender<String>, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(text) => {
            let _ = out_tx.send(text);
        }
        Err(e) => error!(error = %e, "Failed to serialize MCP response"),
    }
}

/// Writes queued responses, one per line.
async fn write_loop<W>(mut writer: W, mut out_rx: mpsc::UnboundedReceiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(text) = out_rx.recv().await {
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
