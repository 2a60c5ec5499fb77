use super::models::LogLevel;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

pub(crate) fn default_max_attempts() -> u32 {
    3
}

pub(crate) fn default_per_attempt_timeout_ms() -> u64 {
    12_000
}

pub(crate) fn default_backoff_base_ms() -> u64 {
    300
}

pub(crate) fn default_backoff_multiplier() -> u32 {
    2
}

pub(crate) fn default_items_per_page() -> usize {
    11
}

pub(crate) fn default_ascending() -> bool {
    true
}

pub(crate) fn default_library_root() -> PathBuf {
    PathBuf::from("library")
}

pub(crate) fn default_downloads_dir() -> PathBuf {
    PathBuf::from(".downloads")
}

pub(crate) fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}
