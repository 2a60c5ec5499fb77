//! Error taxonomy for the reading session.
//!
//! Gateways report failures as `anyhow::Error`; the resilient invoker is the
//! only place those are turned into a [`ReaderError`]. Everything above it
//! (session, navigation, downloads) speaks this type and eventually flattens
//! it into the session's error string.

use std::time::Duration;

pub const UNKNOWN_ERROR: &str = "unknown error";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{operation} failed: {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("chapter {chapter_id} of {series_id} has no pages")]
    EmptyResult { series_id: String, chapter_id: u32 },
}

impl ReaderError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        ReaderError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Build a remote failure from a gateway error, falling back to a generic
    /// message when the error carries no text.
    pub fn remote(operation: &'static str, err: &anyhow::Error) -> Self {
        let rendered = format!("{err:#}");
        let message = if rendered.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            rendered
        };
        ReaderError::Remote { operation, message }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ReaderError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn remote_error_keeps_gateway_message() {
        let err = ReaderError::remote("get_chapter", &anyhow!("connection reset"));
        assert_eq!(err.to_string(), "get_chapter failed: connection reset");
    }

    #[test]
    fn blank_remote_error_becomes_unknown() {
        let err = ReaderError::remote("reading_download", &anyhow!("   "));
        assert_eq!(err.to_string(), "reading_download failed: unknown error");
    }

    #[test]
    fn timeout_display_reports_millis() {
        let err = ReaderError::Timeout {
            operation: "check_download",
            after: Duration::from_millis(12_000),
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "check_download timed out after 12000ms");
    }

    #[test]
    fn empty_result_names_chapter() {
        let err = ReaderError::EmptyResult {
            series_id: "Naruto".to_string(),
            chapter_id: 5,
        };
        assert_eq!(err.to_string(), "chapter 5 of Naruto has no pages");
    }
}
