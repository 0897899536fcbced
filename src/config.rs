//! Runtime configuration and its builder.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use winccoa_mcp::Config;
//!
//! # fn example() -> winccoa_mcp::Result<()> {
//! let config = Config::builder()
//!     .port(9151)
//!     .request_timeout(Some(Duration::from_secs(10)))
//!     .api_base("http://localhost:3000")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default port the peer connects to.
pub const DEFAULT_PORT: u16 = 9151;

/// Default bind address (localhost).
pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Default per-call timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending requests before rejecting new ones.
pub const DEFAULT_MAX_PENDING: usize = 100;

/// Default base URL of the WinCC OA REST API the peer proxies to.
pub const DEFAULT_API_BASE: &str = "http://localhost:3000";

// ============================================================================
// Config
// ============================================================================

/// Validated runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the peer WebSocket server binds to.
    pub bind_ip: IpAddr,

    /// Port the peer WebSocket server binds to (0 = random).
    pub port: u16,

    /// Default per-call timeout; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,

    /// Cap on simultaneously outstanding calls.
    pub max_pending: usize,

    /// Base URL used to build query URLs; always ends with `/`.
    pub api_base: Url,
}

impl Config {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_ip: DEFAULT_BIND_IP,
            port: DEFAULT_PORT,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            max_pending: DEFAULT_MAX_PENDING,
            api_base: default_api_base(),
        }
    }
}

/// Parses the built-in API base.
fn default_api_base() -> Url {
    // The literal is a valid absolute URL with a root path.
    Url::parse(DEFAULT_API_BASE).unwrap_or_else(|_| unreachable!("default API base is valid"))
}

// ============================================================================
// ConfigBuilder
// ============================================================================

/// Builder for [`Config`].
///
/// Unset fields fall back to the `DEFAULT_*` constants.
#[derive(Debug, Default, Clone)]
pub struct ConfigBuilder {
    bind_ip: Option<IpAddr>,
    port: Option<u16>,
    request_timeout: Option<Option<Duration>>,
    max_pending: Option<usize>,
    api_base: Option<String>,
}

impl ConfigBuilder {
    /// Creates a new builder with no overrides.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bind address.
    #[inline]
    #[must_use]
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = Some(ip);
        self
    }

    /// Sets the bind port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the default per-call timeout (`None` disables it).
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the cap on outstanding calls.
    #[inline]
    #[must_use]
    pub fn max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = Some(max_pending);
        self
    }

    /// Sets the API base URL.
    #[inline]
    #[must_use]
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `max_pending` is zero or a timeout is zero
    /// - [`Error::Config`] if the API base is not an absolute http(s) URL
    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();

        let max_pending = self.max_pending.unwrap_or(defaults.max_pending);
        if max_pending == 0 {
            return Err(Error::config("max_pending must be greater than zero"));
        }

        let request_timeout = self.request_timeout.unwrap_or(defaults.request_timeout);
        if request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config(
                "request_timeout must be non-zero; use None to disable it",
            ));
        }

        let api_base = match self.api_base {
            Some(raw) => parse_api_base(&raw)?,
            None => defaults.api_base,
        };

        Ok(Config {
            bind_ip: self.bind_ip.unwrap_or(defaults.bind_ip),
            port: self.port.unwrap_or(defaults.port),
            request_timeout,
            max_pending,
            api_base,
        })
    }
}

/// Parses and normalises an API base so relative joins append to its path.
fn parse_api_base(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| Error::config(format!("Invalid API base URL '{raw}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::config(format!(
            "API base URL must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
