//! # Core Configuration
//!
//! Plain-struct configuration with environment-variable overrides. Defaults
//! match the documented system constants; `for_testing()` constructors use
//! short timers so integration tests finish quickly.

use crate::constants::system;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the event dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Default maximum delivery attempts per event
    pub default_max_retries: u32,
    /// Base delay for the capped exponential retry backoff
    pub backoff_base: Duration,
    /// Cap applied to the retry backoff
    pub backoff_max: Duration,
    /// Cadence of the failed-event retry scan
    pub retry_scan_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_max_retries: system::DEFAULT_EVENT_MAX_RETRIES,
            backoff_base: Duration::from_secs(system::RETRY_BACKOFF_BASE_SECS),
            backoff_max: Duration::from_secs(system::RETRY_BACKOFF_MAX_SECS),
            retry_scan_interval: Duration::from_secs(system::RETRY_SCAN_INTERVAL_SECS),
        }
    }
}

impl DispatcherConfig {
    /// Configuration with short timers for tests
    pub fn for_testing() -> Self {
        Self {
            default_max_retries: 3,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(100),
            retry_scan_interval: Duration::from_millis(50),
        }
    }
}

/// Configuration for the workflow engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Max retries recorded on tasks created without an explicit limit
    pub default_task_max_retries: u32,
    /// Per-stage task cap applied when a stage does not set `max_tasks`
    pub default_stage_max_tasks: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_task_max_retries: system::DEFAULT_TASK_MAX_RETRIES,
            default_stage_max_tasks: system::DEFAULT_STAGE_MAX_TASKS,
        }
    }
}

/// Top-level configuration for the orchestration core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    pub dispatcher: DispatcherConfig,
    pub engine: EngineConfig,
}

impl CoreConfig {
    /// Load configuration from the environment, falling back to defaults
    ///
    /// Recognized variables: `CADENCE_EVENT_MAX_RETRIES`,
    /// `CADENCE_BACKOFF_BASE_SECS`, `CADENCE_BACKOFF_MAX_SECS`,
    /// `CADENCE_RETRY_SCAN_SECS`, `CADENCE_TASK_MAX_RETRIES`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(max_retries) = std::env::var("CADENCE_EVENT_MAX_RETRIES") {
            config.dispatcher.default_max_retries = max_retries.parse().map_err(|e| {
                CoreError::configuration(format!("Invalid CADENCE_EVENT_MAX_RETRIES: {e}"))
            })?;
        }

        if let Ok(base) = std::env::var("CADENCE_BACKOFF_BASE_SECS") {
            config.dispatcher.backoff_base = Duration::from_secs(base.parse().map_err(|e| {
                CoreError::configuration(format!("Invalid CADENCE_BACKOFF_BASE_SECS: {e}"))
            })?);
        }

        if let Ok(max) = std::env::var("CADENCE_BACKOFF_MAX_SECS") {
            config.dispatcher.backoff_max = Duration::from_secs(max.parse().map_err(|e| {
                CoreError::configuration(format!("Invalid CADENCE_BACKOFF_MAX_SECS: {e}"))
            })?);
        }

        if let Ok(scan) = std::env::var("CADENCE_RETRY_SCAN_SECS") {
            config.dispatcher.retry_scan_interval =
                Duration::from_secs(scan.parse().map_err(|e| {
                    CoreError::configuration(format!("Invalid CADENCE_RETRY_SCAN_SECS: {e}"))
                })?);
        }

        if let Ok(task_retries) = std::env::var("CADENCE_TASK_MAX_RETRIES") {
            config.engine.default_task_max_retries = task_retries.parse().map_err(|e| {
                CoreError::configuration(format!("Invalid CADENCE_TASK_MAX_RETRIES: {e}"))
            })?;
        }

        Ok(config)
    }

    /// Configuration with short timers for tests
    pub fn for_testing() -> Self {
        Self {
            dispatcher: DispatcherConfig::for_testing(),
            engine: EngineConfig::default(),
        }
    }
}
