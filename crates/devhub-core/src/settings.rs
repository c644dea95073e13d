//! Settings domain types and validation.
//!
//! All fields are optional so a partial `settings.json` works; the
//! `effective_*` getters apply defaults.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grace window between SIGTERM and SIGKILL.
pub const DEFAULT_STOP_GRACE_SECS: u64 = 5;

/// How long `stop` blocks its caller.
pub const DEFAULT_STOP_WAIT_SECS: u64 = 10;

/// Health predicate polling interval while waiting for readiness.
pub const DEFAULT_HEALTH_POLL_MILLIS: u64 = 500;

/// Fallback delay when a process has no health predicate.
pub const DEFAULT_OPTIMISTIC_START_MILLIS: u64 = 1_000;

/// Drain bound for a plain shutdown.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 15;

/// Drain bound before replacing the process image.
pub const DEFAULT_RESTART_DRAIN_SECS: u64 = 30;

/// Interval of the background health watch.
pub const DEFAULT_HEALTH_WATCH_SECS: u64 = 10;

/// Port of the local status listener.
pub const DEFAULT_HTTP_PORT: u16 = 7420;

/// Supervisor and shutdown settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub stop_grace_secs: Option<u64>,
    pub stop_wait_secs: Option<u64>,
    pub health_poll_millis: Option<u64>,
    pub optimistic_start_millis: Option<u64>,
    pub drain_timeout_secs: Option<u64>,
    pub restart_drain_secs: Option<u64>,
    pub health_watch_secs: Option<u64>,
    pub http_port: Option<u16>,
}

impl Settings {
    /// Create settings with every default filled in.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            stop_grace_secs: Some(DEFAULT_STOP_GRACE_SECS),
            stop_wait_secs: Some(DEFAULT_STOP_WAIT_SECS),
            health_poll_millis: Some(DEFAULT_HEALTH_POLL_MILLIS),
            optimistic_start_millis: Some(DEFAULT_OPTIMISTIC_START_MILLIS),
            drain_timeout_secs: Some(DEFAULT_DRAIN_TIMEOUT_SECS),
            restart_drain_secs: Some(DEFAULT_RESTART_DRAIN_SECS),
            health_watch_secs: Some(DEFAULT_HEALTH_WATCH_SECS),
            http_port: Some(DEFAULT_HTTP_PORT),
        }
    }

    /// Load settings from a JSON file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::with_defaults()),
            Err(e) => return Err(SettingsError::Io(e.to_string())),
        };

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| SettingsError::Parse(e.to_string()))?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs.unwrap_or(DEFAULT_STOP_GRACE_SECS))
    }

    #[must_use]
    pub fn stop_wait(&self) -> Duration {
        Duration::from_secs(self.stop_wait_secs.unwrap_or(DEFAULT_STOP_WAIT_SECS))
    }

    #[must_use]
    pub fn health_poll(&self) -> Duration {
        Duration::from_millis(self.health_poll_millis.unwrap_or(DEFAULT_HEALTH_POLL_MILLIS))
    }

    #[must_use]
    pub fn optimistic_start(&self) -> Duration {
        Duration::from_millis(
            self.optimistic_start_millis
                .unwrap_or(DEFAULT_OPTIMISTIC_START_MILLIS),
        )
    }

    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs.unwrap_or(DEFAULT_DRAIN_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn restart_drain(&self) -> Duration {
        Duration::from_secs(self.restart_drain_secs.unwrap_or(DEFAULT_RESTART_DRAIN_SECS))
    }

    #[must_use]
    pub fn health_watch_interval(&self) -> Duration {
        Duration::from_secs(self.health_watch_secs.unwrap_or(DEFAULT_HEALTH_WATCH_SECS))
    }

    #[must_use]
    pub const fn effective_http_port(&self) -> u16 {
        match self.http_port {
            Some(port) => port,
            None => DEFAULT_HTTP_PORT,
        }
    }
}

/// Errors that can occur loading or validating settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Io(String),

    #[error("Failed to parse settings: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if settings.stop_grace_secs == Some(0) {
        return Err(SettingsError::Invalid {
            field: "stop_grace_secs",
            reason: "grace window must be at least 1 second".to_string(),
        });
    }

    let (grace, wait) = (settings.stop_grace(), settings.stop_wait());
    if wait <= grace {
        return Err(SettingsError::Invalid {
            field: "stop_wait_secs",
            reason: format!(
                "effective wait ({}s) must exceed effective grace ({}s)",
                wait.as_secs(),
                grace.as_secs()
            ),
        });
    }

    if settings.health_poll_millis == Some(0) {
        return Err(SettingsError::Invalid {
            field: "health_poll_millis",
            reason: "poll interval must be positive".to_string(),
        });
    }

    if settings.health_watch_secs == Some(0) {
        return Err(SettingsError::Invalid {
            field: "health_watch_secs",
            reason: "watch interval must be at least 1 second".to_string(),
        });
    }

    if let Some(port) = settings.http_port {
        if port < 1024 {
            return Err(SettingsError::Invalid {
                field: "http_port",
                reason: format!("{port} is a privileged port; use a port >= 1024"),
            });
        }
    }

    Ok(())
}
