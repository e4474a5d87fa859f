//! Configuration loading and validation.
//!
//! Reads `config.json` from the config directory, applies environment
//! variable overrides, and validates the result. Configuration is loaded
//! exactly once at startup; a missing or malformed file is a fatal startup
//! error - the agent refuses to run half-configured.
//!
//! # Environment Variables
//!
//! - `DRIMS_CONFIG_DIR` - explicit config directory override
//! - `DRIMS_SERVER_URL` - dispatch server WebSocket URL
//! - `DRIMS_PRINTER_ID` / `DRIMS_PRINTER_NAME` - printer identity
//! - `DRIMS_FACILITY_ID` / `DRIMS_FACILITY_NAME` - owning facility identity
//! - `DRIMS_LOG_DIR` - log file directory

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::constants::{PAGE_LOAD_TIMEOUT, PRINT_POLL_BUDGET};

/// Configuration for the print agent.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Dispatch server URL. Only `ws://` or `wss://` is accepted.
    pub server_url: String,
    /// Printer identifier assigned by the facility.
    pub printer_id: String,
    /// Human-readable printer name.
    pub printer_name: String,
    /// Identifier of the facility that owns this printer.
    pub facility_id: String,
    /// Human-readable facility name.
    pub facility_name: String,
    /// Directory for daily log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Page/script timeout for the rendering browser, in seconds.
    #[serde(default = "default_page_load_timeout_secs")]
    pub page_load_timeout_secs: u64,
    /// Maximum readiness polls before a report load is declared timed out.
    #[serde(default = "default_print_poll_budget")]
    pub print_poll_budget: u32,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("log_file")
}

fn default_page_load_timeout_secs() -> u64 {
    PAGE_LOAD_TIMEOUT.as_secs()
}

fn default_print_poll_budget() -> u32 {
    PRINT_POLL_BUDGET
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "ws://192.168.1.21:11303/".to_string(),
            printer_id: "193".to_string(),
            printer_name: "QQ".to_string(),
            facility_id: String::new(),
            facility_name: String::new(),
            log_dir: default_log_dir(),
            page_load_timeout_secs: default_page_load_timeout_secs(),
            print_poll_budget: default_print_poll_budget(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `DRIMS_CONFIG_DIR` overrides the platform config dir; the override is
    /// what integration tests use to point the agent at a temp directory.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("DRIMS_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("could not determine config directory")?
                .join("drims-printer")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("create config dir {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from file, applies env overrides, validates.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or unparseable, or when the merged
    /// result does not validate (non-WebSocket scheme, blank identity).
    pub fn load() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("read config file {}", config_path.display()))?;
        let mut config = Self::from_json(&content)
            .with_context(|| format!("parse config file {}", config_path.display()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from its JSON representation.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Persists the current configuration to disk (used by `config --init`).
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("write config file {}", config_path.display()))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(server_url) = std::env::var("DRIMS_SERVER_URL") {
            self.server_url = server_url;
        }
        if let Ok(printer_id) = std::env::var("DRIMS_PRINTER_ID") {
            self.printer_id = printer_id;
        }
        if let Ok(printer_name) = std::env::var("DRIMS_PRINTER_NAME") {
            self.printer_name = printer_name;
        }
        if let Ok(facility_id) = std::env::var("DRIMS_FACILITY_ID") {
            self.facility_id = facility_id;
        }
        if let Ok(facility_name) = std::env::var("DRIMS_FACILITY_NAME") {
            self.facility_name = facility_name;
        }
        if let Ok(log_dir) = std::env::var("DRIMS_LOG_DIR") {
            self.log_dir = PathBuf::from(log_dir);
        }
    }

    /// Validate the merged configuration.
    ///
    /// # Errors
    ///
    /// Fails on a non-WebSocket server scheme or blank printer identity.
    pub fn validate(&self) -> Result<()> {
        if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            bail!(
                "server_url must use a ws:// or wss:// scheme, got: {}",
                self.server_url
            );
        }
        if self.printer_id.trim().is_empty() {
            bail!("printer_id must not be blank");
        }
        if self.printer_name.trim().is_empty() {
            bail!("printer_name must not be blank");
        }
        Ok(())
    }

    /// Display name sent in the login frame: `<printer_id>.<printer_name>`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.printer_id, self.printer_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        config.validate().expect("default config should validate");
        assert_eq!(config.display_name(), "193.QQ");
    }

    #[test]
    fn test_from_json_minimal() {
        let config = Config::from_json(
            r#"{
                "server_url": "wss://dispatch.example:11303/",
                "printer_id": "7",
                "printer_name": "front-desk",
                "facility_id": "42",
                "facility_name": "city-clinic"
            }"#,
        )
        .expect("minimal config should parse");

        assert_eq!(config.server_url, "wss://dispatch.example:11303/");
        assert_eq!(config.display_name(), "7.front-desk");
        // Optional fields fall back to defaults.
        assert_eq!(config.log_dir, PathBuf::from("log_file"));
        assert_eq!(config.page_load_timeout_secs, 10);
        assert_eq!(config.print_poll_budget, 150);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(Config::from_json("not json").is_err());
        assert!(Config::from_json(r#"{"server_url": 5}"#).is_err());
    }

    #[test]
    fn test_validate_rejects_non_websocket_scheme() {
        let mut config = Config::default();
        config.server_url = "http://192.168.1.21:11303/".to_string();
        assert!(config.validate().is_err());

        config.server_url = "tcp://192.168.1.21:11303/".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_identity() {
        let mut config = Config::default();
        config.printer_id = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.printer_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wss_scheme_accepted() {
        let mut config = Config::default();
        config.server_url = "wss://dispatch.example/".to_string();
        config.validate().expect("wss should validate");
    }
}
