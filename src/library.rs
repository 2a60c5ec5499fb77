//! Filesystem-backed gateway.
//!
//! Layout: `root/{series}/{chapter}/{page files}` for the remote side and
//! `downloads_dir/{series}/{chapter}/` for local copies. A copy is complete
//! once its `.complete` marker exists.

use crate::cache::{self, LastRead};
use crate::config::LibraryConfig;
use crate::gateway::{ChapterEntry, ChapterGateway, ChapterPages};
use crate::route::{ChapterRoute, validate_series_id};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const COMPLETE_MARKER: &str = ".complete";

#[derive(Debug, Clone)]
pub struct LocalLibrary {
    root: PathBuf,
    downloads_dir: PathBuf,
    cache_dir: PathBuf,
}

impl LocalLibrary {
    pub fn new(
        root: impl Into<PathBuf>,
        downloads_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            downloads_dir: downloads_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn from_config(config: &LibraryConfig) -> Self {
        Self::new(&config.root, &config.downloads_dir, &config.cache_dir)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path handed to single and bulk downloads for a series.
    pub fn series_path(&self, series_id: &str) -> PathBuf {
        self.root.join(series_id)
    }

    /// Chapter ids present for a series, ascending.
    pub fn chapter_ids(&self, series_id: &str) -> Result<Vec<u32>> {
        validate_series_id(series_id)?;
        let dir = self.series_path(series_id);
        let entries =
            fs::read_dir(&dir).with_context(|| format!("listing series {}", dir.display()))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
                .filter(|id| *id > 0)
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn list_chapters(&self, series_id: &str) -> Result<Vec<ChapterEntry>> {
        Ok(self
            .chapter_ids(series_id)?
            .into_iter()
            .map(|chapter_id| ChapterEntry {
                chapter_id,
                title: format!("Chapter {chapter_id}"),
                downloaded: self.is_downloaded(series_id, chapter_id),
            })
            .collect())
    }

    /// Series ids are joined onto library paths, so they must name a
    /// single directory below them.
    fn chapter_dir(&self, series_id: &str, chapter_id: u32) -> Result<PathBuf> {
        validate_series_id(series_id)?;
        Ok(self.series_path(series_id).join(chapter_id.to_string()))
    }

    fn download_dir(&self, series_id: &str, chapter_id: u32) -> Result<PathBuf> {
        validate_series_id(series_id)?;
        Ok(self
            .downloads_dir
            .join(series_id)
            .join(chapter_id.to_string()))
    }

    fn is_downloaded(&self, series_id: &str, chapter_id: u32) -> bool {
        self.download_dir(series_id, chapter_id)
            .is_ok_and(|dir| dir.join(COMPLETE_MARKER).exists())
    }

    fn copy_chapter(&self, series_id: &str, chapter_id: u32) -> Result<()> {
        let source = self.chapter_dir(series_id, chapter_id)?;
        let target = self.download_dir(series_id, chapter_id)?;
        let pages = page_files(&source)?;
        fs::create_dir_all(&target)
            .with_context(|| format!("creating download dir {}", target.display()))?;
        for page in &pages {
            let Some(name) = page.file_name() else {
                continue;
            };
            fs::copy(page, target.join(name))
                .with_context(|| format!("copying {}", page.display()))?;
        }
        fs::write(target.join(COMPLETE_MARKER), pages.len().to_string())?;
        info!(
            series = series_id,
            chapter = chapter_id,
            pages = pages.len(),
            "Chapter copied to downloads"
        );
        Ok(())
    }
}

/// Page files of a chapter directory in natural order (`2.png` before
/// `10.png`). Hidden files are skipped.
fn page_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("listing chapter {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        files.push((natural_key(&name), entry.path()));
    }
    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn natural_key(name: &str) -> (u64, String) {
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    let number = digits.parse::<u64>().unwrap_or(u64::MAX);
    (number, name.to_string())
}

fn series_from_path(data_path: &Path) -> Result<String> {
    data_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no series in path {}", data_path.display()))
}

#[async_trait]
impl ChapterGateway for LocalLibrary {
    async fn get_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterPages> {
        let dir = self.chapter_dir(series_id, chapter_id)?;
        let pages = page_files(&dir)?
            .into_iter()
            .map(|path| path.to_string_lossy().to_string())
            .collect();
        Ok(ChapterPages { pages })
    }

    async fn check_download(&self, series_id: &str, chapter_id: u32) -> Result<bool> {
        Ok(self.is_downloaded(series_id, chapter_id))
    }

    async fn reading_download(&self, series_id: &str, chapter_id: u32) -> Result<()> {
        self.copy_chapter(series_id, chapter_id)
    }

    async fn single_download(&self, data_path: &Path, chapter_id: u32) -> Result<bool> {
        let series_id = series_from_path(data_path)?;
        self.copy_chapter(&series_id, chapter_id)?;
        Ok(true)
    }

    async fn multiple_download(&self, data_path: &Path, quantity: u32) -> Result<bool> {
        let series_id = series_from_path(data_path)?;
        let pending: Vec<u32> = self
            .chapter_ids(&series_id)?
            .into_iter()
            .filter(|id| !self.is_downloaded(&series_id, *id))
            .take(quantity as usize)
            .collect();
        debug!(series = %series_id, ?pending, "Bulk download selection");
        for chapter_id in pending {
            self.copy_chapter(&series_id, chapter_id)?;
        }
        Ok(true)
    }

    async fn get_next_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterRoute> {
        let next = self
            .chapter_ids(series_id)?
            .into_iter()
            .find(|id| *id > chapter_id)
            .ok_or_else(|| anyhow!("{series_id} has no chapter after {chapter_id}"))?;
        Ok(ChapterRoute::new(series_id, next, 0)?)
    }

    async fn get_prev_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterRoute> {
        let prev = self
            .chapter_ids(series_id)?
            .into_iter()
            .rev()
            .find(|id| *id < chapter_id)
            .ok_or_else(|| anyhow!("{series_id} has no chapter before {chapter_id}"))?;
        Ok(ChapterRoute::new(series_id, prev, 0)?)
    }

    async fn save_last_read(&self, series_id: &str, chapter_id: u32, page: usize) -> Result<()> {
        validate_series_id(series_id)?;
        cache::save_last_read(
            &self.cache_dir,
            series_id,
            LastRead {
                chapter: chapter_id,
                page,
            },
        )
    }
}
