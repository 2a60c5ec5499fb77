//! Download deduplication for the active reading session.
//!
//! A [`DownloadGuard`] belongs to exactly one chapter session and is replaced
//! with it. Reading prefetches are deduplicated per target; single and bulk
//! downloads are passed straight through.

use crate::error::{ReaderError, Result};
use crate::gateway::{ChapterEntry, ChapterGateway};
use crate::resilience::ResilientInvoker;
use crate::route::{validate_chapter_id, validate_series_id};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum DownloadTaskState {
    #[default]
    Idle,
    InFlight,
    Completed,
    FailedPermanent,
}

impl DownloadTaskState {
    /// Prefetches fire once per session, whatever their outcome.
    pub fn already_requested(self) -> bool {
        matches!(
            self,
            DownloadTaskState::Completed | DownloadTaskState::FailedPermanent
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TaskKey {
    series_id: String,
    chapter_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    Downloaded,
    /// Nothing was sent; the target was in flight or already requested.
    Skipped(DownloadTaskState),
}

/// Proof that a prefetch was admitted by [`DownloadGuard::begin_prefetch`].
#[derive(Debug, PartialEq, Eq)]
pub struct PrefetchTicket {
    key: TaskKey,
}

impl PrefetchTicket {
    pub fn series_id(&self) -> &str {
        &self.key.series_id
    }

    pub fn chapter_id(&self) -> u32 {
        self.key.chapter_id
    }
}

#[derive(Debug, Default)]
pub struct DownloadGuard {
    tasks: HashMap<TaskKey, DownloadTaskState>,
}

impl DownloadGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, series_id: &str, chapter_id: u32) -> DownloadTaskState {
        self.tasks
            .get(&TaskKey {
                series_id: series_id.to_string(),
                chapter_id,
            })
            .copied()
            .unwrap_or_default()
    }

    /// Admit a prefetch for the target, marking it in flight. Returns the
    /// blocking state when the target is in flight or was already requested.
    pub fn begin_prefetch(
        &mut self,
        series_id: &str,
        chapter_id: u32,
    ) -> std::result::Result<PrefetchTicket, DownloadTaskState> {
        let key = TaskKey {
            series_id: series_id.to_string(),
            chapter_id,
        };
        let state = self.tasks.entry(key.clone()).or_default();
        match *state {
            DownloadTaskState::Idle => {
                *state = DownloadTaskState::InFlight;
                Ok(PrefetchTicket { key })
            }
            blocked => Err(blocked),
        }
    }

    /// Clear the in-flight marker and remember the target as requested.
    pub fn finish_prefetch(&mut self, ticket: PrefetchTicket, succeeded: bool) {
        let state = if succeeded {
            DownloadTaskState::Completed
        } else {
            DownloadTaskState::FailedPermanent
        };
        self.tasks.insert(ticket.key, state);
    }

    pub async fn trigger_reading_prefetch<G>(
        &mut self,
        gateway: &G,
        invoker: &ResilientInvoker,
        series_id: &str,
        chapter_id: u32,
    ) -> Result<PrefetchOutcome>
    where
        G: ChapterGateway + ?Sized,
    {
        validate_series_id(series_id)?;
        validate_chapter_id(chapter_id)?;

        let ticket = match self.begin_prefetch(series_id, chapter_id) {
            Ok(ticket) => ticket,
            Err(state) => {
                debug!(
                    series = series_id,
                    chapter = chapter_id,
                    ?state,
                    "Skipping duplicate reading prefetch"
                );
                return Ok(PrefetchOutcome::Skipped(state));
            }
        };

        info!(
            series = series_id,
            chapter = chapter_id,
            "Prefetching next chapter"
        );
        let result = invoker
            .invoke("reading_download", || {
                gateway.reading_download(series_id, chapter_id)
            })
            .await;
        self.finish_prefetch(ticket, result.is_ok());

        match result {
            Ok(()) => Ok(PrefetchOutcome::Downloaded),
            Err(err) => {
                warn!(
                    series = series_id,
                    chapter = chapter_id,
                    error = %err,
                    "Reading prefetch failed; not retrying this session"
                );
                Err(err)
            }
        }
    }

    /// Download one chapter on request. Not deduplicated: the user may retry
    /// as often as they like.
    pub async fn download_single<G>(
        &self,
        gateway: &G,
        invoker: &ResilientInvoker,
        data_path: &Path,
        chapter_id: u32,
    ) -> Result<()>
    where
        G: ChapterGateway + ?Sized,
    {
        validate_chapter_id(chapter_id)?;
        let accepted = invoker
            .invoke("single_download", || {
                gateway.single_download(data_path, chapter_id)
            })
            .await?;
        if accepted {
            info!(path = %data_path.display(), chapter = chapter_id, "Chapter downloaded");
            Ok(())
        } else {
            Err(ReaderError::Remote {
                operation: "single_download",
                message: format!("chapter {chapter_id} was not downloaded"),
            })
        }
    }

    /// Flag `entry` as downloaded up front and roll the flag back if the
    /// download fails.
    pub async fn download_single_optimistic<G>(
        &self,
        gateway: &G,
        invoker: &ResilientInvoker,
        data_path: &Path,
        entry: &mut ChapterEntry,
    ) -> Result<()>
    where
        G: ChapterGateway + ?Sized,
    {
        let previous = entry.downloaded;
        entry.downloaded = true;
        let result = self
            .download_single(gateway, invoker, data_path, entry.chapter_id)
            .await;
        if let Err(err) = &result {
            entry.downloaded = previous;
            warn!(chapter = entry.chapter_id, error = %err, "Reverting optimistic download flag");
        }
        result
    }

    /// Ask the gateway for `quantity` chapters. Repeated calls are forwarded
    /// every time.
    pub async fn download_bulk<G>(
        &self,
        gateway: &G,
        invoker: &ResilientInvoker,
        data_path: &Path,
        quantity: u32,
    ) -> bool
    where
        G: ChapterGateway + ?Sized,
    {
        if quantity == 0 {
            warn!(path = %data_path.display(), "Ignoring bulk download of zero chapters");
            return false;
        }
        match invoker
            .invoke("multiple_download", || {
                gateway.multiple_download(data_path, quantity)
            })
            .await
        {
            Ok(accepted) => {
                info!(path = %data_path.display(), quantity, accepted, "Bulk download finished");
                accepted
            }
            Err(err) => {
                warn!(path = %data_path.display(), quantity, error = %err, "Bulk download failed");
                false
            }
        }
    }
}
