//! `winccoa-mcp` binary.
//!
//! Binds the peer WebSocket server and serves MCP on stdin/stdout.
//!
//! ```text
//! winccoa-mcp [--port N] [--bind IP] [--api-base URL] [--timeout-ms N] [--debug]
//! ```
//!
//! `WINCCOA_PORT` and `WINCCOA_API_BASE` are used when the matching flag is
//! absent. Logs go to stderr; `RUST_LOG` overrides the default filter.

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::future::Future;
use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use winccoa_mcp::mcp::{DatapointTools, McpServer, serve_stdio};
use winccoa_mcp::transport::PeerServer;
use winccoa_mcp::{Bridge, Config, Error, Result};

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
struct Args {
    port: Option<String>,
    bind: Option<String>,
    api_base: Option<String>,
    timeout_ms: Option<String>,
    debug: bool,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> Result<Self> {
        let mut args = Self::default();
        let mut iter = env::args().skip(1);

        while let Some(arg) = iter.next() {
            let slot = match arg.as_str() {
                "--debug" => {
                    args.debug = true;
                    continue;
                }
                "--port" => &mut args.port,
                "--bind" => &mut args.bind,
                "--api-base" => &mut args.api_base,
                "--timeout-ms" => &mut args.timeout_ms,
                other => return Err(Error::config(format!("Unknown argument: {other}"))),
            };
            let value = iter
                .next()
                .ok_or_else(|| Error::config(format!("{arg} requires a value")))?;
            *slot = Some(value);
        }

        args.port = args.port.or_else(|| env::var("WINCCOA_PORT").ok());
        args.api_base = args.api_base.or_else(|| env::var("WINCCOA_API_BASE").ok());

        Ok(args)
    }

    /// Builds the runtime configuration.
    fn to_config(&self) -> Result<Config> {
        let mut builder = Config::builder();

        if let Some(port) = &self.port {
            let port = port
                .parse::<u16>()
                .map_err(|e| Error::config(format!("Invalid port '{port}': {e}")))?;
            builder = builder.port(port);
        }
        if let Some(bind) = &self.bind {
            let ip = bind
                .parse::<IpAddr>()
                .map_err(|e| Error::config(format!("Invalid bind address '{bind}': {e}")))?;
            builder = builder.bind_ip(ip);
        }
        if let Some(api_base) = &self.api_base {
            builder = builder.api_base(api_base.clone());
        }
        if let Some(timeout_ms) = &self.timeout_ms {
            let millis = timeout_ms
                .parse::<u64>()
                .map_err(|e| Error::config(format!("Invalid timeout '{timeout_ms}': {e}")))?;
            let timeout = (millis > 0).then(|| Duration::from_millis(millis));
            builder = builder.request_timeout(timeout);
        }

        builder.build()
    }
}

// ============================================================================
// Entry Point
// ============================================================================

fn main() -> ExitCode {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(args.debug);

    match block_on_detached(run(&args)).and_then(|outcome| outcome) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

/// Runs `future` on a fresh runtime, then shuts the runtime down without
/// waiting for blocking tasks.
///
/// Stdin is read on a blocking thread that only returns once a line or EOF
/// arrives; waiting for it would keep the process alive after Ctrl-C.
fn block_on_detached<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let output = runtime.block_on(future);
    runtime.shutdown_background();

    Ok(output)
}

async fn run(args: &Args) -> Result<()> {
    let config = args.to_config()?;
    let bridge = Arc::new(Bridge::new(&config));

    let server = PeerServer::bind(config.bind_ip, config.port).await?;
    info!(url = %server.ws_url(), "Waiting for WinCC OA peer");
    let peers = server.serve(bridge.clone());

    let tools = DatapointTools::new(bridge.clone(), config.api_base.clone());
    let mcp = Arc::new(McpServer::new(tools));

    let outcome = tokio::select! {
        result = serve_stdio(mcp) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    peers.shutdown().await;
    bridge.shutdown();

    outcome
}

/// Initialize tracing on stderr; stdout carries MCP traffic.
fn init_logging(debug: bool) {
    let default = if debug {
        "winccoa_mcp=debug"
    } else {
        "winccoa_mcp=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn test_block_on_detached_does_not_wait_for_blocking_tasks() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let start = Instant::now();

        let output = block_on_detached(async move {
            // Stands in for a stdin read that never completes
            let _blocked = tokio::task::spawn_blocking(move || release_rx.recv());
            7
        })
        .expect("runtime");

        assert_eq!(output, 7);
        assert!(start.elapsed() < Duration::from_secs(5));
        drop(release_tx);
    }

    #[test]
    fn test_timeout_flag_zero_disables() {
        let args = Args {
            timeout_ms: Some("0".to_string()),
            ..Args::default()
        };
        assert_eq!(args.to_config().expect("config").request_timeout, None);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let args = Args {
            port: Some("not-a-port".to_string()),
            ..Args::default()
        };
        assert!(matches!(args.to_config(), Err(Error::Config { .. })));
    }
}
