use super::models::ReaderConfig;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> ReaderConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded reader config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return ReaderConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            ReaderConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<ReaderConfig, toml::de::Error> {
    let mut config: ReaderConfig = toml::from_str(contents)?;
    config.retry = config.retry.sanitized();
    config.pagination.items_per_page = config.pagination.items_per_page.max(1);
    Ok(config)
}

pub fn serialize_config(config: &ReaderConfig) -> Result<String, toml::ser::Error> {
    toml::to_string(config)
}
