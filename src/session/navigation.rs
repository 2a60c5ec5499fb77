//! Page and chapter transitions for a [`ReadingSession`].
//!
//! Only forward navigation past the last page persists the last-read
//! position. Moving backwards never overwrites it.

use super::{ReadingSession, SessionStatus};
use crate::downloads::{DownloadTaskState, PrefetchOutcome};
use crate::error::Result;
use crate::events::SessionEvent;
use crate::gateway::ChapterGateway;
use crate::route::ChapterRoute;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Page(usize),
    Chapter(ChapterRoute),
    /// Nothing moved; any failure is in the session error.
    Stayed,
}

/// First page index at which the next chapter gets prefetched:
/// `ceil(quantity_pages / 2)`.
pub fn prefetch_threshold(quantity_pages: i64) -> i64 {
    (quantity_pages.max(0) + 1) / 2
}

impl<G: ChapterGateway + ?Sized> ReadingSession<G> {
    pub async fn next_page(&mut self) -> Navigation {
        if self.status == SessionStatus::Loading {
            debug!("Ignoring next page while chapter is loading");
            return Navigation::Stayed;
        }
        let quantity = self.chapter.quantity_pages();
        if quantity < 0 {
            return self.next_chapter().await;
        }

        let target = self.chapter.current_page + 1;
        if target as i64 > quantity {
            return self.finish_chapter().await;
        }

        if !self.prefetch_triggered && target as i64 >= prefetch_threshold(quantity) {
            self.prefetch_triggered = true;
            // Resolved before the page index moves so effects stay in order.
            self.prefetch_next_chapter().await;
        }
        self.commit_page(target)
    }

    pub async fn prev_page(&mut self) -> Navigation {
        if self.status == SessionStatus::Loading {
            debug!("Ignoring previous page while chapter is loading");
            return Navigation::Stayed;
        }
        if self.status == SessionStatus::Ready && self.chapter.current_page > 0 {
            return self.commit_page(self.chapter.current_page - 1);
        }
        self.prev_chapter().await
    }

    pub async fn next_chapter(&mut self) -> Navigation {
        match self.resolve_next_route().await {
            Ok(route) => self.navigate(route).await,
            Err(err) => {
                self.record_error(&err);
                Navigation::Stayed
            }
        }
    }

    pub async fn prev_chapter(&mut self) -> Navigation {
        let series_id = self.chapter.series_id.clone();
        let chapter_id = self.chapter.chapter_id;
        let resolved = self
            .invoker
            .invoke("get_prev_chapter", || {
                self.gateway.get_prev_chapter(&series_id, chapter_id)
            })
            .await;
        match resolved {
            Ok(route) => self.navigate(route).await,
            Err(err) => {
                self.record_error(&err);
                Navigation::Stayed
            }
        }
    }

    /// Leave the last page: resolve the next chapter, persist the position
    /// reached, then load the new chapter.
    async fn finish_chapter(&mut self) -> Navigation {
        let route = match self.resolve_next_route().await {
            Ok(route) => route,
            Err(err) => {
                self.record_error(&err);
                return Navigation::Stayed;
            }
        };
        self.save_last_read().await;
        self.prefetch_triggered = false;
        self.navigate(route).await
    }

    async fn resolve_next_route(&self) -> Result<ChapterRoute> {
        let series_id = self.chapter.series_id.as_str();
        let chapter_id = self.chapter.chapter_id;
        self.invoker
            .invoke("get_next_chapter", || {
                self.gateway.get_next_chapter(series_id, chapter_id)
            })
            .await
    }

    async fn save_last_read(&mut self) {
        let series_id = self.chapter.series_id.clone();
        let chapter_id = self.chapter.chapter_id;
        let page = self.chapter.current_page;
        let saved = self
            .invoker
            .invoke("save_last_read", || {
                self.gateway.save_last_read(&series_id, chapter_id, page)
            })
            .await;
        match saved {
            Ok(()) => {
                info!(series = %series_id, chapter = chapter_id, page, "Saved last read position");
                self.events.publish(&SessionEvent::LastReadSaved {
                    series_id,
                    chapter_id,
                    page,
                });
            }
            Err(err) => self.record_error(&err),
        }
    }

    async fn prefetch_next_chapter(&mut self) {
        let Some(chapter_id) = self.chapter.chapter_id.checked_add(1) else {
            debug!(
                chapter = self.chapter.chapter_id,
                "No chapter id after this one; skipping prefetch"
            );
            return;
        };
        if self.chapter.next_downloaded {
            debug!(
                chapter = chapter_id,
                "Next chapter already downloaded; skipping prefetch"
            );
            return;
        }
        let series_id = self.chapter.series_id.clone();
        if self.downloads.state(&series_id, chapter_id) == DownloadTaskState::Idle {
            self.events.publish(&SessionEvent::PrefetchStarted {
                series_id: series_id.clone(),
                chapter_id,
            });
        }

        let outcome = self
            .downloads
            .trigger_reading_prefetch(&*self.gateway, &self.invoker, &series_id, chapter_id)
            .await;
        match outcome {
            Ok(PrefetchOutcome::Downloaded) => {
                self.mark_next_downloaded();
                self.events.publish(&SessionEvent::PrefetchFinished {
                    series_id,
                    chapter_id,
                    ok: true,
                });
            }
            Ok(PrefetchOutcome::Skipped(_)) => {}
            Err(err) => {
                self.events.publish(&SessionEvent::PrefetchFinished {
                    series_id,
                    chapter_id,
                    ok: false,
                });
                self.record_error(&err);
            }
        }
    }

    fn commit_page(&mut self, page: usize) -> Navigation {
        match self.set_current_page(page) {
            Ok(()) => Navigation::Page(page),
            Err(err) => {
                self.record_error(&err);
                Navigation::Stayed
            }
        }
    }

    async fn navigate(&mut self, route: ChapterRoute) -> Navigation {
        info!(route = %route, "Navigating to chapter");
        self.events.publish(&SessionEvent::Navigate {
            route: route.clone(),
        });
        self.enter(route.clone()).await;
        Navigation::Chapter(route)
    }
}
