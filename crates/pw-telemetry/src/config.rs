//! Telemetry configuration from environment variables.

use std::env;

const DEFAULT_SERVICE: &str = "passkey-wallet";
const DEFAULT_LEVEL: &str = "info";

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to log lines
    pub service_name: String,

    /// Level (`info`) or a full `EnvFilter` directive
    /// (`pw_wallet_core=debug,info`)
    pub log_level: String,

    /// Write logs to stdout
    pub console_output: bool,

    /// Render logs as JSON lines
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE.to_string(),
            log_level: DEFAULT_LEVEL.to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `PW_SERVICE_NAME`, `PW_LOG_LEVEL` (falling back to `RUST_LOG`),
    /// `PW_CONSOLE_OUTPUT` and `PW_JSON_LOGS`. Unset or unparsable values keep
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            service_name: lookup("PW_SERVICE_NAME")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.service_name),
            log_level: lookup("PW_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .filter(|level| !level.trim().is_empty())
                .unwrap_or(defaults.log_level),
            console_output: lookup("PW_CONSOLE_OUTPUT")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.console_output),
            json_logs: lookup("PW_JSON_LOGS")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.json_logs),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
