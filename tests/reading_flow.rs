use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chapter_reader::{
    ChapterGateway, ChapterPages, ChapterRoute, Navigation, ReadingSession, ResilientInvoker,
    RetryPolicy, SessionEvent, SessionStatus,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// In-memory series: every chapter in `1..=last_chapter` has `pages` pages.
struct SeriesDouble {
    last_chapter: u32,
    pages: usize,
    downloaded: Mutex<HashSet<u32>>,
    log: Mutex<Vec<String>>,
}

impl SeriesDouble {
    fn new(last_chapter: u32, pages: usize) -> Self {
        Self {
            last_chapter,
            pages,
            downloaded: Mutex::new(HashSet::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.log()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl ChapterGateway for SeriesDouble {
    async fn get_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterPages> {
        self.record(format!("get_chapter {series_id} {chapter_id}"));
        if chapter_id > self.last_chapter {
            return Err(anyhow!("no chapter {chapter_id}"));
        }
        Ok(ChapterPages {
            pages: (0..self.pages)
                .map(|page| format!("{series_id}/{chapter_id}/{page}.jpg"))
                .collect(),
        })
    }

    async fn check_download(&self, _series_id: &str, chapter_id: u32) -> Result<bool> {
        Ok(self.downloaded.lock().unwrap().contains(&chapter_id))
    }

    async fn reading_download(&self, series_id: &str, chapter_id: u32) -> Result<()> {
        self.record(format!("reading_download {series_id} {chapter_id}"));
        self.downloaded.lock().unwrap().insert(chapter_id);
        Ok(())
    }

    async fn single_download(&self, _data_path: &Path, chapter_id: u32) -> Result<bool> {
        self.downloaded.lock().unwrap().insert(chapter_id);
        Ok(true)
    }

    async fn multiple_download(&self, _data_path: &Path, _quantity: u32) -> Result<bool> {
        Ok(true)
    }

    async fn get_next_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterRoute> {
        if chapter_id >= self.last_chapter {
            return Err(anyhow!("{series_id} ends at chapter {chapter_id}"));
        }
        Ok(ChapterRoute::new(series_id, chapter_id + 1, 0)?)
    }

    async fn get_prev_chapter(&self, series_id: &str, chapter_id: u32) -> Result<ChapterRoute> {
        if chapter_id <= 1 {
            return Err(anyhow!("{series_id} starts at chapter {chapter_id}"));
        }
        Ok(ChapterRoute::new(series_id, chapter_id - 1, 0)?)
    }

    async fn save_last_read(&self, series_id: &str, chapter_id: u32, page: usize) -> Result<()> {
        self.record(format!("save_last_read {series_id} {chapter_id} {page}"));
        Ok(())
    }
}

#[tokio::test]
async fn reading_through_a_chapter_prefetches_once_and_saves_on_exit() {
    let gateway = Arc::new(SeriesDouble::new(12, 10));
    let route: ChapterRoute = "/reader/Naruto/5/3".parse().unwrap();
    let mut session =
        ReadingSession::open(Arc::clone(&gateway), ResilientInvoker::default(), route).await;
    assert_eq!(session.status(), SessionStatus::Ready);
    assert_eq!(session.chapter().quantity_pages(), 9);
    assert_eq!(session.chapter().current_page, 3);

    let kinds = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&kinds);
    let _subscription = session.events().subscribe(move |event: &SessionEvent| {
        sink.lock().unwrap().push(event.kind());
    });

    for expected in 4..=9 {
        assert_eq!(session.next_page().await, Navigation::Page(expected));
    }
    assert_eq!(gateway.count("reading_download Naruto 6"), 1);
    assert_eq!(gateway.count("save_last_read"), 0);
    assert!(session.chapter().next_downloaded);

    let moved = session.next_page().await;

    assert_eq!(
        moved,
        Navigation::Chapter(ChapterRoute::new("Naruto", 6, 0).unwrap())
    );
    assert_eq!(
        gateway
            .log()
            .iter()
            .filter(|entry| entry.starts_with("save_last_read"))
            .collect::<Vec<_>>(),
        vec!["save_last_read Naruto 5 9"]
    );
    assert_eq!(session.chapter().chapter_id, 6);
    assert_eq!(session.chapter().current_page, 0);
    assert_eq!(session.status(), SessionStatus::Ready);
    assert!(!session.prefetch_triggered());

    let kinds = kinds.lock().unwrap();
    let saved_at = kinds.iter().position(|kind| *kind == "last-read-saved");
    let navigated_at = kinds.iter().position(|kind| *kind == "navigate");
    assert!(saved_at.is_some());
    assert!(saved_at < navigated_at);
}

#[tokio::test]
async fn going_back_from_first_page_never_saves() {
    let gateway = Arc::new(SeriesDouble::new(12, 4));
    let route = ChapterRoute::new("Naruto", 5, 1).unwrap();
    let mut session =
        ReadingSession::open(Arc::clone(&gateway), ResilientInvoker::default(), route).await;

    assert_eq!(session.prev_page().await, Navigation::Page(0));
    let moved = session.prev_page().await;

    assert_eq!(
        moved,
        Navigation::Chapter(ChapterRoute::new("Naruto", 4, 0).unwrap())
    );
    assert_eq!(gateway.count("save_last_read"), 0);
    assert_eq!(session.chapter().chapter_id, 4);
}

#[tokio::test(start_paused = true)]
async fn last_chapter_stays_put_with_an_error() {
    let gateway = Arc::new(SeriesDouble::new(5, 2));
    let invoker = ResilientInvoker::new(RetryPolicy {
        max_attempts: 1,
        ..RetryPolicy::default()
    });
    let route = ChapterRoute::new("Naruto", 5, 1).unwrap();
    let mut session = ReadingSession::open(Arc::clone(&gateway), invoker, route).await;

    assert_eq!(session.next_page().await, Navigation::Stayed);

    assert_eq!(session.chapter().chapter_id, 5);
    assert_eq!(session.chapter().current_page, 1);
    assert!(session.chapter().error.is_some());
    assert_eq!(gateway.count("save_last_read"), 0);
}
