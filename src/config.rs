//! Configuration loading from environment variables or a TOML file.
//!
//! Invalid environment values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `RSS_GUARD_MEMORY_LIMIT` | 0 | Resident memory limit in bytes (0 = unlimited) |
//! | `RSS_GUARD_FLUSH_THRESHOLD` | 1048576 | Batched correction flush threshold (bytes) |
//! | `RSS_GUARD_LOG_LEVEL` | info | `tracing` filter directive |
//! | `RSS_GUARD_LOG_FORMAT` | json | `json` or `pretty` |

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::batch::LocalBatch;
use crate::counters::GlobalCounters;
use crate::error::AccountingError;
use crate::limiter::MemoryLimiter;
use crate::telemetry::{self, LogConfig, LogFormat};

pub const DEFAULT_FLUSH_THRESHOLD: u64 = 1024 * 1024;

/// Effective configuration for the accounting layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    /// Resident limit in bytes. `None` disables enforcement.
    pub memory_limit: Option<u64>,
    pub flush_threshold: u64,
    pub log: LogConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            memory_limit: None,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            log: LogConfig::default(),
        }
    }
}

/// On-disk shape; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    memory_limit: Option<u64>,
    flush_threshold: Option<u64>,
    log_level: Option<String>,
    log_format: Option<LogFormat>,
    log_path: Option<PathBuf>,
}

fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// A limit of zero means "no limit".
fn limit_from(raw: u64) -> Option<u64> {
    (raw > 0).then_some(raw)
}

fn load_log_config() -> LogConfig {
    let level = std::env::var("RSS_GUARD_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    let format = std::env::var("RSS_GUARD_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    LogConfig {
        format,
        level,
        output_path: None,
    }
}

/// Load configuration from `RSS_GUARD_*` environment variables.
pub fn load() -> GuardConfig {
    GuardConfig {
        memory_limit: limit_from(parse_u64("RSS_GUARD_MEMORY_LIMIT", 0)),
        flush_threshold: parse_u64("RSS_GUARD_FLUSH_THRESHOLD", DEFAULT_FLUSH_THRESHOLD),
        log: load_log_config(),
    }
}

impl GuardConfig {
    /// Parse a TOML document. Unlike the environment loader, errors are reported.
    pub fn from_toml_str(text: &str) -> Result<Self, AccountingError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| AccountingError::Config(e.to_string()))?;
        let defaults = GuardConfig::default();

        Ok(Self {
            memory_limit: file.memory_limit.and_then(limit_from),
            flush_threshold: file.flush_threshold.unwrap_or(defaults.flush_threshold),
            log: LogConfig {
                format: file.log_format.unwrap_or(defaults.log.format),
                level: file.log_level.unwrap_or(defaults.log.level),
                output_path: file.log_path,
            },
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, AccountingError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AccountingError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Limiter enforcing `memory_limit` over `counters`.
    pub fn limiter<'a>(&self, counters: &'a GlobalCounters) -> MemoryLimiter<'a> {
        MemoryLimiter::new(counters, self.memory_limit)
    }

    /// Per-thread batch flushing at `flush_threshold`.
    pub fn batch<'a>(&self, counters: &'a GlobalCounters) -> LocalBatch<'a> {
        LocalBatch::new(counters, self.flush_threshold)
    }

    /// Install the process-wide `tracing` subscriber described by `log`.
    pub fn init_logging(&self) -> Result<(), AccountingError> {
        telemetry::init_logging(&self.log).map_err(|e| AccountingError::Config(e.to_string()))
    }
}
