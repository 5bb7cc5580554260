//! Server configuration
//!
//! Layered with precedence: built-in defaults < TOML file < env vars
//! (`ROUTE_RELAY_*`) < CLI flags.

use crate::service::ServiceSettings;
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const HOUR_SECS: u64 = 60 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Command-line flags. Unset flags leave lower layers untouched.
#[derive(Parser, Serialize, Debug, Default)]
#[command(name = "route-relay-server", version, about = "Real-time route relay")]
pub struct Cli {
    /// Path to TOML config file
    #[arg(long, env = "ROUTE_RELAY_CONFIG", default_value = "./route-relay.toml")]
    #[serde(skip)]
    pub config: String,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// SQLite connection string for the durable store
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Shared secret for the admin clean endpoint
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_secret_key: Option<String>,

    /// Enable structured JSON logging
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_logs: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Routes not updated within this many hours are purged
    pub route_expiry_hours: u64,
    pub max_routes_per_request: usize,
    pub cleanup_interval_secs: u64,
    /// Connections attached for longer than this are swept
    pub client_timeout_hours: u64,
    pub admin_secret_key: String,
    /// Size of the snapshot sent to newly connected peers
    pub existing_routes_limit: usize,
    pub json_logs: bool,
    /// Install the Prometheus recorder and serve `/metrics`
    pub metrics: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "sqlite://route-relay.db".to_string(),
            route_expiry_hours: 24,
            max_routes_per_request: 1000,
            cleanup_interval_secs: 3600,
            client_timeout_hours: 24,
            admin_secret_key: "admin-secret-key".to_string(),
            existing_routes_limit: 100,
            json_logs: false,
            metrics: true,
        }
    }
}

impl RelayConfig {
    /// Load from the TOML file named by `cli`, the environment and `cli` itself
    pub fn load(cli: &Cli) -> ConfigResult<Self> {
        Self::figment(cli).extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(RelayConfig::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("ROUTE_RELAY_").ignore(&["config"]))
            .merge(Serialized::defaults(cli))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be at least 1".into()));
        }
        if self.route_expiry_hours == 0 {
            return Err(ConfigError::Invalid(
                "route_expiry_hours must be at least 1".into(),
            ));
        }
        if self.max_routes_per_request == 0 {
            return Err(ConfigError::Invalid(
                "max_routes_per_request must be at least 1".into(),
            ));
        }
        if self.admin_secret_key.trim().is_empty() {
            return Err(ConfigError::Invalid("admin_secret_key must not be empty".into()));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "cleanup_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn route_expiry(&self) -> Duration {
        Duration::from_secs(self.route_expiry_hours.saturating_mul(HOUR_SECS))
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            route_expiry: self.route_expiry(),
            max_routes_per_request: self.max_routes_per_request,
            client_timeout: Duration::from_secs(self.client_timeout_hours.saturating_mul(HOUR_SECS)),
            admin_secret: self.admin_secret_key.clone(),
            existing_routes_limit: self.existing_routes_limit.min(self.max_routes_per_request),
            existing_routes_window: self.route_expiry(),
        }
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Route Relay Configuration
# Place this file at ./route-relay.toml or specify with --config <path>
# All settings can be overridden via environment variables
# (ROUTE_RELAY_PORT, etc.) or CLI flags (--port, etc.)

# Bind address (default: 0.0.0.0)
# host = "0.0.0.0"

# Server port (default: 3000)
# port = 3000

# Durable store. The relay falls back to in-memory routes when it is
# unreachable.
# database_url = "sqlite://route-relay.db"

# Routes not updated within this many hours are purged (default: 24)
# route_expiry_hours = 24

# Upper bound for GET /routes (default: 1000)
# max_routes_per_request = 1000

# Seconds between expiry sweeps (default: 3600)
# cleanup_interval_secs = 3600

# Connections attached for longer than this many hours are dropped (default: 24)
# client_timeout_hours = 24

# Value expected in the Authorization header of POST /clean-routes
# admin_secret_key = "admin-secret-key"

# Routes sent to a peer when it connects (default: 100)
# existing_routes_limit = 100

# Structured JSON logging
# json_logs = false

# Serve Prometheus metrics at /metrics
# metrics = true
"#
    .to_string()
}
