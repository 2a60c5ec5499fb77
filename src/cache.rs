//! Last-read position store.
//!
//! Positions are kept per series under the cache directory, in a folder named
//! by a hash of the series id to avoid filesystem issues. The format is a
//! tiny TOML file with `chapter` and `page` fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRead {
    pub chapter: u32,
    pub page: usize,
}

pub fn hash_dir(cache_dir: &Path, series_id: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(series_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    cache_dir.join(hash)
}

fn last_read_path(cache_dir: &Path, series_id: &str) -> PathBuf {
    hash_dir(cache_dir, series_id).join("last_read.toml")
}

/// Load the stored position for a series, if any. Unreadable entries count
/// as absent.
pub fn load_last_read(cache_dir: &Path, series_id: &str) -> Option<LastRead> {
    let path = last_read_path(cache_dir, series_id);
    let data = fs::read_to_string(&path).ok()?;
    match toml::from_str(&data) {
        Ok(entry) => Some(entry),
        Err(err) => {
            debug!(path = %path.display(), "Ignoring unreadable last-read entry: {err}");
            None
        }
    }
}

pub fn save_last_read(cache_dir: &Path, series_id: &str, entry: LastRead) -> Result<()> {
    let path = last_read_path(cache_dir, series_id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating cache dir {}", parent.display()))?;
    }
    let contents = toml::to_string(&entry).context("serializing last-read entry")?;
    fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
