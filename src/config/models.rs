use crate::resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration; deserializable from TOML.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ReaderConfig {
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaginationConfig {
    #[serde(default = "crate::config::defaults::default_items_per_page")]
    pub items_per_page: usize,
    #[serde(default = "crate::config::defaults::default_ascending")]
    pub ascending: bool,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig {
            items_per_page: crate::config::defaults::default_items_per_page(),
            ascending: crate::config::defaults::default_ascending(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LibraryConfig {
    #[serde(default = "crate::config::defaults::default_library_root")]
    pub root: PathBuf,
    #[serde(default = "crate::config::defaults::default_downloads_dir")]
    pub downloads_dir: PathBuf,
    #[serde(default = "crate::config::defaults::default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            root: crate::config::defaults::default_library_root(),
            downloads_dir: crate::config::defaults::default_downloads_dir(),
            cache_dir: crate::config::defaults::default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: crate::config::defaults::default_log_level(),
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
