//! Chapter reading session controller.
//!
//! Owns the state of one open chapter (pages, reading position, neighbor
//! download flags), turns page turns into page or chapter transitions, and
//! routes every remote call through a timeout/retry wrapper.

pub mod bindings;
pub mod cache;
pub mod config;
pub mod downloads;
pub mod error;
pub mod events;
pub mod gateway;
pub mod library;
pub mod pagination;
pub mod resilience;
pub mod route;
pub mod session;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{ReaderError, Result};
pub use events::{EventBus, SessionEvent, Subscription};
pub use gateway::{ChapterEntry, ChapterGateway, ChapterPages, ResourceId};
pub use library::LocalLibrary;
pub use resilience::{ResilientInvoker, RetryPolicy};
pub use route::ChapterRoute;
pub use session::{Navigation, ReadingSession, SessionSnapshot, SessionStatus};
