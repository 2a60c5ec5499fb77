//! Configuration loading for the chapter reader.
//!
//! All tunable settings are loaded from `conf/config.toml` if present. Missing
//! or invalid entries fall back to defaults so a session can always start.

pub(crate) mod defaults;
mod io;
mod models;

pub use defaults::DEFAULT_CONFIG_PATH;
pub use io::{load_config, parse_config, serialize_config};
pub use models::{LibraryConfig, LogLevel, LoggingConfig, PaginationConfig, ReaderConfig};
