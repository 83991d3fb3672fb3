//! Gateway configuration.
//!
//! Settings are layered: an optional file (JSON, YAML or TOML, picked by
//! extension) then `GOPKG_`-prefixed environment variables, e.g.
//! `GOPKG_VCS_URL=https://git.example.com`.

use crate::observability::LogFormat;
use crate::upstream::Credentials;
use gopkg_types::Hosts;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use validator::{Validate, ValidationError};

/// Prefix of the environment variables read by [`GatewayConfig::load`].
pub const ENV_PREFIX: &str = "GOPKG";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("invalid gateway url {url:?}: {reason}")]
    GatewayUrl { url: String, reason: String },
}

/// Configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Listen address.
    #[serde(default = "default_addr")]
    pub addr: SocketAddr,

    /// Public URL of the gateway; import paths start with its host.
    #[validate(url)]
    pub gopkg_url: String,

    /// URL of the upstream Git host.
    #[validate(url)]
    pub vcs_url: String,

    /// Basic auth user for the upstream host.
    #[serde(default)]
    pub vcs_auth_user: String,

    /// Basic auth password for the upstream host.
    #[serde(default)]
    pub vcs_auth_pass: String,

    /// Upstream request timeout in seconds.
    #[serde(default = "default_upstream_timeout")]
    #[validate(range(min = 1))]
    pub upstream_timeout_secs: u64,

    /// Inbound request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_upstream_timeout() -> u64 {
    20
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Ok(());
    }
    let mut err = ValidationError::new("log_level");
    err.message = Some(format!("Log level must be one of {}", LOG_LEVELS.join(", ")).into());
    Err(err)
}

impl GatewayConfig {
    /// Loads the configuration from `path`, if it exists, and the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Public addresses derived from the configured URLs.
    pub fn hosts(&self) -> Result<Hosts, ConfigError> {
        let invalid = |reason: &str| ConfigError::GatewayUrl {
            url: self.gopkg_url.clone(),
            reason: reason.to_string(),
        };

        let url = Url::parse(&self.gopkg_url).map_err(|e| invalid(&e.to_string()))?;
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let gateway_host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Hosts {
            gateway_scheme: url.scheme().to_string(),
            gateway_host,
            upstream_url: self.vcs_url.trim_end_matches('/').to_string(),
        })
    }

    /// Upstream credentials, when both user and password are set.
    pub fn credentials(&self) -> Option<Credentials> {
        if self.vcs_auth_user.is_empty() || self.vcs_auth_pass.is_empty() {
            return None;
        }
        Some(Credentials {
            user: self.vcs_auth_user.clone(),
            pass: self.vcs_auth_pass.clone(),
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
