//! Contract for the remote side of the reader.
//!
//! The session treats the gateway as a black box: every method may be slow,
//! may fail, and is always called through the resilient invoker.

use crate::route::ChapterRoute;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use ts_rs::TS;

/// Opaque identifier of a page resource (a path or URL understood by the view).
pub type ResourceId = String;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChapterPages {
    pub pages: Vec<ResourceId>,
}

#[async_trait]
pub trait ChapterGateway: Send + Sync {
    async fn get_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterPages>;

    async fn check_download(&self, series_id: &str, chapter_id: u32) -> Result<bool>;

    async fn reading_download(&self, series_id: &str, chapter_id: u32) -> Result<()>;

    async fn single_download(&self, data_path: &Path, chapter_id: u32) -> Result<bool>;

    async fn multiple_download(&self, data_path: &Path, quantity: u32) -> Result<bool>;

    /// Route of the chapter following `chapter_id`; the gateway owns ordering.
    async fn get_next_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterRoute>;

    async fn get_prev_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterRoute>;

    async fn save_last_read(&self, series_id: &str, chapter_id: u32, page: usize) -> Result<()>;
}

/// One row of a chapter listing as shown by the host view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChapterEntry {
    pub chapter_id: u32,
    pub title: String,
    pub downloaded: bool,
}
