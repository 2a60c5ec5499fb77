//! Chapter session state machine.
//!
//! A [`ReadingSession`] owns everything about the chapter currently open: the
//! fetched pages, the reading position, neighbor download flags and the
//! download guard. Navigation transitions live in [`navigation`].
//!
//! Fetches are tagged with a generation. Dispatching a new fetch bumps the
//! generation, and a result is only applied if its generation is still the
//! current one when it resolves.

pub mod navigation;

use crate::downloads::DownloadGuard;
use crate::error::{ReaderError, Result};
use crate::events::{EventBus, SessionEvent};
use crate::gateway::{ChapterEntry, ChapterGateway, ChapterPages, ResourceId};
use crate::resilience::ResilientInvoker;
use crate::route::ChapterRoute;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use ts_rs::TS;

pub use navigation::Navigation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum SessionStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Chapter metadata and reading position exposed to the host view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ChapterSession {
    pub series_id: String,
    pub chapter_id: u32,
    pub current_page: usize,
    pub pages: Vec<ResourceId>,
    pub loading: bool,
    pub error: Option<String>,
    pub next_downloaded: bool,
    pub prev_downloaded: bool,
}

impl ChapterSession {
    pub fn new(route: &ChapterRoute) -> Self {
        Self {
            series_id: route.series_id.clone(),
            chapter_id: route.chapter_id,
            current_page: 0,
            pages: Vec::new(),
            loading: false,
            error: None,
            next_downloaded: false,
            prev_downloaded: false,
        }
    }

    /// Index of the last page; `-1` until pages are loaded.
    pub fn quantity_pages(&self) -> i64 {
        self.pages.len() as i64 - 1
    }

    pub fn current_resource(&self) -> Option<&ResourceId> {
        self.pages.get(self.current_page)
    }
}

/// A fetch that has been dispatched but not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub route: ChapterRoute,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeighborStatus {
    pub next_downloaded: bool,
    pub prev_downloaded: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct SessionSnapshot {
    pub route: ChapterRoute,
    pub status: SessionStatus,
    #[ts(type = "number")]
    pub generation: u64,
    #[ts(type = "number")]
    pub quantity_pages: i64,
    pub current_resource: Option<ResourceId>,
    pub chapter: ChapterSession,
}

pub struct ReadingSession<G: ChapterGateway + ?Sized> {
    gateway: Arc<G>,
    invoker: ResilientInvoker,
    events: EventBus,
    route: ChapterRoute,
    chapter: ChapterSession,
    status: SessionStatus,
    generation: u64,
    downloads: DownloadGuard,
    prefetch_triggered: bool,
}

impl<G: ChapterGateway + ?Sized> ReadingSession<G> {
    /// Create an idle session for `route`. Call [`ReadingSession::load`] to
    /// fetch its pages.
    pub fn new(gateway: Arc<G>, invoker: ResilientInvoker, route: ChapterRoute) -> Self {
        Self {
            gateway,
            invoker,
            events: EventBus::new(),
            chapter: ChapterSession::new(&route),
            route,
            status: SessionStatus::Idle,
            generation: 0,
            downloads: DownloadGuard::new(),
            prefetch_triggered: false,
        }
    }

    /// Create a session and run its first load.
    pub async fn open(gateway: Arc<G>, invoker: ResilientInvoker, route: ChapterRoute) -> Self {
        let mut session = Self::new(gateway, invoker, route);
        session.load().await;
        session
    }

    pub fn chapter(&self) -> &ChapterSession {
        &self.chapter
    }

    pub fn route(&self) -> &ChapterRoute {
        &self.route
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn downloads(&self) -> &DownloadGuard {
        &self.downloads
    }

    pub fn prefetch_triggered(&self) -> bool {
        self.prefetch_triggered
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            route: self.route.clone(),
            status: self.status,
            generation: self.generation,
            quantity_pages: self.chapter.quantity_pages(),
            current_resource: self.chapter.current_resource().cloned(),
            chapter: self.chapter.clone(),
        }
    }

    /// Switch to `route`. A different series or chapter gets entirely fresh
    /// state; the same chapter at another page is simply re-fetched.
    pub async fn enter(&mut self, route: ChapterRoute) {
        if !self.route.same_chapter(&route) {
            info!(
                from = %self.route,
                to = %route,
                "Replacing chapter session"
            );
            self.chapter = ChapterSession::new(&route);
            self.downloads = DownloadGuard::new();
            self.prefetch_triggered = false;
            self.status = SessionStatus::Idle;
        }
        self.route = route;
        self.load().await;
    }

    /// Fetch the pages for the current route, then check neighbor downloads.
    pub async fn load(&mut self) {
        let request = self.dispatch_fetch();
        let result = self.fetch_pages(&request).await;
        if self.apply_fetch(&request, result) && self.status == SessionStatus::Ready {
            self.refresh_neighbors().await;
        }
    }

    /// Enter `Loading` and hand out a request tagged with a fresh generation.
    /// Any earlier request still outstanding becomes stale.
    pub fn dispatch_fetch(&mut self) -> FetchRequest {
        self.generation = self.generation.wrapping_add(1);
        self.status = SessionStatus::Loading;
        self.chapter.loading = true;
        self.chapter.error = None;
        let request = FetchRequest {
            generation: self.generation,
            route: self.route.clone(),
        };
        debug!(
            route = %request.route,
            generation = request.generation,
            "Dispatching chapter fetch"
        );
        self.events.publish(&SessionEvent::Loading {
            generation: request.generation,
            route: request.route.clone(),
        });
        request
    }

    pub async fn fetch_pages(&self, request: &FetchRequest) -> Result<ChapterPages> {
        let series_id = request.route.series_id.as_str();
        let chapter_id = request.route.chapter_id;
        self.invoker
            .invoke("get_chapter", || {
                self.gateway.get_chapter(series_id, chapter_id)
            })
            .await
    }

    /// Apply a resolved fetch. Returns `false` when the result was stale and
    /// discarded.
    pub fn apply_fetch(&mut self, request: &FetchRequest, result: Result<ChapterPages>) -> bool {
        if request.generation != self.generation {
            debug!(
                generation = request.generation,
                current = self.generation,
                "Ignoring stale chapter fetch"
            );
            self.events.publish(&SessionEvent::Stale {
                generation: request.generation,
                current: self.generation,
            });
            return false;
        }

        self.chapter.loading = false;
        let outcome = result.and_then(|fetched| {
            if fetched.pages.is_empty() {
                Err(ReaderError::EmptyResult {
                    series_id: request.route.series_id.clone(),
                    chapter_id: request.route.chapter_id,
                })
            } else {
                Ok(fetched.pages)
            }
        });

        match outcome {
            Ok(pages) => {
                self.chapter.pages = pages;
                let last = self.chapter.pages.len() - 1;
                self.chapter.current_page = request.route.page.min(last);
                self.chapter.error = None;
                self.status = SessionStatus::Ready;
                info!(
                    route = %request.route,
                    generation = request.generation,
                    pages = self.chapter.pages.len(),
                    current_page = self.chapter.current_page,
                    "Chapter ready"
                );
                self.events.publish(&SessionEvent::Ready {
                    generation: request.generation,
                    quantity_pages: self.chapter.quantity_pages(),
                    current_page: self.chapter.current_page,
                });
            }
            Err(err) => {
                self.chapter.pages.clear();
                self.chapter.current_page = 0;
                self.chapter.error = Some(err.to_string());
                self.status = SessionStatus::Error;
                warn!(
                    route = %request.route,
                    generation = request.generation,
                    error = %err,
                    "Chapter failed to load"
                );
                self.events.publish(&SessionEvent::Failed {
                    generation: request.generation,
                    message: err.to_string(),
                });
            }
        }
        true
    }

    /// Query download status of both neighbors concurrently. Failures count
    /// as "not downloaded" and never touch the session status.
    pub async fn check_neighbors(&self, series_id: &str, chapter_id: u32) -> NeighborStatus {
        let gateway = &self.gateway;
        let next_id = chapter_id.checked_add(1);
        let next = async {
            match next_id {
                Some(next_id) => {
                    self.invoker
                        .invoke("check_download", || {
                            gateway.check_download(series_id, next_id)
                        })
                        .await
                }
                // Last representable chapter has no successor.
                None => Ok(false),
            }
        };
        let prev = async {
            if chapter_id > 1 {
                self.invoker
                    .invoke("check_download", || {
                        gateway.check_download(series_id, chapter_id - 1)
                    })
                    .await
            } else {
                Ok(false)
            }
        };
        let (next, prev) = tokio::join!(next, prev);
        NeighborStatus {
            next_downloaded: neighbor_flag(next, next_id.unwrap_or(chapter_id)),
            prev_downloaded: neighbor_flag(prev, chapter_id.saturating_sub(1)),
        }
    }

    pub async fn refresh_neighbors(&mut self) {
        let generation = self.generation;
        let series_id = self.route.series_id.clone();
        let status = self.check_neighbors(&series_id, self.route.chapter_id).await;
        self.apply_neighbors(generation, status);
    }

    /// Store neighbor flags unless the session moved on meanwhile.
    pub fn apply_neighbors(&mut self, generation: u64, status: NeighborStatus) -> bool {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "Ignoring stale neighbor status"
            );
            return false;
        }
        self.chapter.next_downloaded = status.next_downloaded;
        self.chapter.prev_downloaded = status.prev_downloaded;
        self.events.publish(&SessionEvent::NeighborStatus {
            generation,
            next_downloaded: status.next_downloaded,
            prev_downloaded: status.prev_downloaded,
        });
        true
    }

    /// Move to page `page` of the loaded chapter.
    pub fn set_current_page(&mut self, page: usize) -> Result<()> {
        if self.status != SessionStatus::Ready {
            return Err(ReaderError::validation(
                "page",
                format!("chapter is not ready ({:?})", self.status),
            ));
        }
        let quantity = self.chapter.quantity_pages();
        if page as i64 > quantity {
            return Err(ReaderError::validation(
                "page",
                format!("{page} is outside 0..={quantity}"),
            ));
        }
        self.chapter.current_page = page;
        debug!(page, generation = self.generation, "Page changed");
        self.events.publish(&SessionEvent::PageChanged {
            generation: self.generation,
            page,
        });
        Ok(())
    }

    pub fn mark_next_downloaded(&mut self) {
        self.chapter.next_downloaded = true;
    }

    pub fn mark_prev_downloaded(&mut self) {
        self.chapter.prev_downloaded = true;
    }

    /// Surface a non-fatal failure without leaving the current status.
    pub fn record_error(&mut self, err: &ReaderError) {
        warn!(
            series = %self.chapter.series_id,
            chapter = self.chapter.chapter_id,
            error = %err,
            "Session error"
        );
        self.chapter.error = Some(err.to_string());
    }

    pub fn clear_error(&mut self) {
        self.chapter.error = None;
    }

    pub async fn download_single(&self, data_path: &Path, entry: &mut ChapterEntry) -> Result<()> {
        self.downloads
            .download_single_optimistic(&*self.gateway, &self.invoker, data_path, entry)
            .await
    }

    pub async fn download_bulk(&self, data_path: &Path, quantity: u32) -> bool {
        self.downloads
            .download_bulk(&*self.gateway, &self.invoker, data_path, quantity)
            .await
    }
}

fn neighbor_flag(result: Result<bool>, chapter_id: u32) -> bool {
    match result {
        Ok(downloaded) => downloaded,
        Err(err) => {
            warn!(
                chapter = chapter_id,
                error = %err,
                "Neighbor download check failed"
            );
            false
        }
    }
}
