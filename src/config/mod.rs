//! Manages application configuration loaded from environment variables.
//!
//! This module defines the `Config` struct which holds all runtime settings
//! and provides the `from_env` function to populate this struct. It supports
//! loading variables from a `.env` file via the `dotenv` crate and provides
//! default values for optional settings.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 1025;
const DEFAULT_HOSTNAME: &str = "smtp-sink.local";

/// Holds the application's runtime configuration settings.
///
/// These settings are typically loaded from environment variables via `from_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The IP address the SMTP sink should listen on. (Optional: `SMTP_SINK_BIND_ADDRESS`, Default: "0.0.0.0")
    pub bind_address: String,

    /// The network port the SMTP sink should listen on. (Optional: `SMTP_SINK_PORT`, Default: 1025)
    pub port: u16,

    /// The name the sink announces in its 220/221 response lines. (Optional: `SMTP_SINK_HOSTNAME`, Default: "smtp-sink.local")
    pub hostname: String,

    /// Whether to advertise and accept `AUTH PLAIN` (spec §4.1/§9). (Optional: `SMTP_SINK_AUTH_ENABLED`, Default: false)
    pub auth_enabled: bool,
}

impl Config {
    /// Loads configuration settings from environment variables.
    ///
    /// Reads variables prefixed with `SMTP_SINK_`. Supports loading from a `.env` file
    /// if present. Every setting is optional and falls back to a documented default.
    /// Logs the configuration values being used.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if `SMTP_SINK_PORT` is set but cannot be parsed as a `u16`, or
    /// `SMTP_SINK_AUTH_ENABLED` is set but is not a valid boolean.
    pub fn from_env() -> Result<Self> {
        // Attempt to load variables from a .env file, if it exists. Ignore errors.
        let _ = dotenv::dotenv();

        let bind_address = env::var("SMTP_SINK_BIND_ADDRESS")
            .map(|val| {
                log::info!("Config: using bind_address from env: {}", val);
                val
            })
            .unwrap_or_else(|_| {
                log::info!("Config: using default bind_address: {}", DEFAULT_BIND_ADDRESS);
                DEFAULT_BIND_ADDRESS.to_string()
            });

        let port_str = env::var("SMTP_SINK_PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
        let port = match port_str.parse::<u16>() {
            Ok(port) => port,
            Err(e) => {
                let err_msg = format!("SMTP_SINK_PORT ('{}') must be a valid u16 port number", port_str);
                log::error!("{}: {}", err_msg, e);
                return Err(anyhow!(e).context(err_msg));
            }
        };
        log::info!("Config: using port: {}", port);

        let hostname = env::var("SMTP_SINK_HOSTNAME")
            .map(|val| {
                log::info!("Config: using hostname from env: {}", val);
                val
            })
            .unwrap_or_else(|_| {
                log::info!("Config: using default hostname: {}", DEFAULT_HOSTNAME);
                DEFAULT_HOSTNAME.to_string()
            });

        let auth_enabled_str = env::var("SMTP_SINK_AUTH_ENABLED").unwrap_or_else(|_| "false".to_string());
        let auth_enabled = match auth_enabled_str.parse::<bool>() {
            Ok(flag) => flag,
            Err(e) => {
                let err_msg = format!(
                    "SMTP_SINK_AUTH_ENABLED ('{}') must be 'true' or 'false'",
                    auth_enabled_str
                );
                log::error!("{}: {}", err_msg, e);
                return Err(anyhow!(e).context(err_msg));
            }
        };
        log::info!("Config: using auth_enabled: {}", auth_enabled);

        Ok(Config {
            bind_address,
            port,
            hostname,
            auth_enabled,
        })
    }

    /// A default configuration bound to a specific port, used by
    /// [`crate::smtp::Server::start_on`] and test harnesses that just want
    /// a sink on an ephemeral port.
    pub fn with_port(port: u16) -> Self {
        Config {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port,
            hostname: DEFAULT_HOSTNAME.to_string(),
            auth_enabled: false,
        }
    }
}
