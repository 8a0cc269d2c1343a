//! Configuration for the watchdog.

use anyhow::{bail, Context, Result};
use rotor_recycle::MaintenanceWindow;

/// Watchdog configuration.
///
/// Resolved once at process start and passed by reference into each
/// component; there is no process-global state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Daily UTC interval during which recycling is permitted.
    pub window: MaintenanceWindow,

    /// Label marking an instance as fleet member; presence, not value,
    /// matters.
    pub restart_label: String,

    /// Ceiling on in-flight plus newly scheduled lifecycle operations per
    /// pass.
    pub ops_limit: usize,

    /// Fleet scope identifier passed to the inventory API.
    pub fleet_scope: String,

    /// Minimum age, in hours, before an instance is recycled again.
    pub min_age_hours: i64,

    /// Compute provider API URL.
    pub compute_endpoint: String,

    /// Optional bearer token for the compute API.
    pub api_token: Option<String>,

    /// Interval between recycling passes.
    pub scan_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing or malformed required settings fail here, before any
    /// provider call is made.
    pub fn from_env() -> Result<Self> {
        let window = require_env("ROTOR_MAINTENANCE_WINDOW")?
            .parse::<MaintenanceWindow>()
            .context("invalid ROTOR_MAINTENANCE_WINDOW")?;

        let restart_label = require_env("ROTOR_RESTART_LABEL")?;

        let ops_limit: usize = require_env("ROTOR_OPS_LIMIT")?
            .parse()
            .context("ROTOR_OPS_LIMIT must be a positive integer")?;
        if ops_limit == 0 {
            bail!("ROTOR_OPS_LIMIT must be at least 1");
        }

        let fleet_scope = require_env("ROTOR_FLEET_SCOPE")?;

        let min_age_hours: i64 = require_env("ROTOR_MIN_AGE_HOURS")?
            .parse()
            .context("ROTOR_MIN_AGE_HOURS must be an integer number of hours")?;
        if min_age_hours < 0 {
            bail!("ROTOR_MIN_AGE_HOURS must not be negative");
        }

        let compute_endpoint = std::env::var("ROTOR_COMPUTE_ENDPOINT")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());

        let api_token = std::env::var("ROTOR_API_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let scan_interval_secs = std::env::var("ROTOR_SCAN_INTERVAL")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(300);

        let log_level = std::env::var("ROTOR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            window,
            restart_label,
            ops_limit,
            fleet_scope,
            min_age_hours,
            compute_endpoint,
            api_token,
            scan_interval_secs,
            log_level,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => bail!("required environment variable {name} is not set"),
    }
}
