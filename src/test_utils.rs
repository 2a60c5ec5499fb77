//! Scripted in-memory gateway for unit tests.
//!
//! Chapters `1..=n` exist by default with ten pages each. Failures are
//! scripted as "the next N calls fail", and every call is recorded.

use crate::gateway::{ChapterGateway, ChapterPages};
use crate::route::ChapterRoute;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    GetChapter(u32),
    CheckDownload(u32),
    ReadingDownload(u32),
    SingleDownload(u32),
    MultipleDownload(u32),
    NextChapter(u32),
    PrevChapter(u32),
    SaveLastRead(String, u32, usize),
}

#[derive(Debug, Default)]
struct Script {
    page_counts: HashMap<u32, usize>,
    last_chapter: u32,
    fetch_failures: u32,
    check_failures: u32,
    reading_download_failures: u32,
    save_failures: u32,
    downloaded: HashSet<u32>,
    single_download_result: bool,
    calls: Vec<GatewayCall>,
}

#[derive(Debug)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn with_chapters(last_chapter: u32) -> Self {
        let page_counts = (1..=last_chapter).map(|id| (id, 10)).collect();
        Self {
            script: Mutex::new(Script {
                page_counts,
                last_chapter,
                single_download_result: true,
                ..Script::default()
            }),
        }
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub fn set_pages(&self, chapter_id: u32, count: usize) {
        self.with_script(|s| {
            s.page_counts.insert(chapter_id, count);
        });
    }

    pub fn fail_fetches(&self, count: u32) {
        self.with_script(|s| s.fetch_failures = count);
    }

    pub fn fail_checks(&self, count: u32) {
        self.with_script(|s| s.check_failures = count);
    }

    pub fn fail_reading_downloads(&self, count: u32) {
        self.with_script(|s| s.reading_download_failures = count);
    }

    pub fn fail_saves(&self, count: u32) {
        self.with_script(|s| s.save_failures = count);
    }

    pub fn mark_downloaded(&self, chapter_id: u32) {
        self.with_script(|s| {
            s.downloaded.insert(chapter_id);
        });
    }

    pub fn set_single_download_result(&self, result: bool) {
        self.with_script(|s| s.single_download_result = result);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.with_script(|s| s.calls.clone())
    }

    pub fn count(&self, predicate: impl Fn(&GatewayCall) -> bool) -> usize {
        self.with_script(|s| s.calls.iter().filter(|call| predicate(call)).count())
    }

    fn record(&self, call: GatewayCall) {
        self.with_script(|s| s.calls.push(call));
    }
}

fn take_failure(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl ChapterGateway for ScriptedGateway {
    async fn get_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterPages> {
        self.record(GatewayCall::GetChapter(chapter_id));
        self.with_script(|s| {
            if take_failure(&mut s.fetch_failures) {
                return Err(anyhow!("scripted fetch failure"));
            }
            let count = s
                .page_counts
                .get(&chapter_id)
                .copied()
                .ok_or_else(|| anyhow!("chapter {chapter_id} not found"))?;
            let pages = (0..count)
                .map(|page| format!("{series_id}/{chapter_id}/{page:03}.png"))
                .collect();
            Ok(ChapterPages { pages })
        })
    }

    async fn check_download(&self, _series_id: &str, chapter_id: u32) -> Result<bool> {
        self.record(GatewayCall::CheckDownload(chapter_id));
        self.with_script(|s| {
            if take_failure(&mut s.check_failures) {
                return Err(anyhow!("scripted check failure"));
            }
            Ok(s.downloaded.contains(&chapter_id))
        })
    }

    async fn reading_download(&self, _series_id: &str, chapter_id: u32) -> Result<()> {
        self.record(GatewayCall::ReadingDownload(chapter_id));
        self.with_script(|s| {
            if take_failure(&mut s.reading_download_failures) {
                return Err(anyhow!("scripted download failure"));
            }
            s.downloaded.insert(chapter_id);
            Ok(())
        })
    }

    async fn single_download(&self, _data_path: &Path, chapter_id: u32) -> Result<bool> {
        self.record(GatewayCall::SingleDownload(chapter_id));
        Ok(self.with_script(|s| s.single_download_result))
    }

    async fn multiple_download(&self, _data_path: &Path, quantity: u32) -> Result<bool> {
        self.record(GatewayCall::MultipleDownload(quantity));
        Ok(true)
    }

    async fn get_next_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterRoute> {
        self.record(GatewayCall::NextChapter(chapter_id));
        let last = self.with_script(|s| s.last_chapter);
        if chapter_id >= last {
            return Err(anyhow!("no chapter after {chapter_id}"));
        }
        Ok(ChapterRoute::new(series_id, chapter_id + 1, 0)?)
    }

    async fn get_prev_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterRoute> {
        self.record(GatewayCall::PrevChapter(chapter_id));
        if chapter_id <= 1 {
            return Err(anyhow!("no chapter before {chapter_id}"));
        }
        Ok(ChapterRoute::new(series_id, chapter_id - 1, 0)?)
    }

    async fn save_last_read(&self, series_id: &str, chapter_id: u32, page: usize) -> Result<()> {
        self.record(GatewayCall::SaveLastRead(
            series_id.to_string(),
            chapter_id,
            page,
        ));
        self.with_script(|s| {
            if take_failure(&mut s.save_failures) {
                return Err(anyhow!("scripted save failure"));
            }
            Ok(())
        })
    }
}
