//! Typed reader routes (`/reader/{series}/{chapter}/{page}`).

use crate::error::{ReaderError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

static ROUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/reader/(?P<series>[^/]+)/(?P<chapter>\d+)(?:/(?P<page>\d+))?/?$")
        .expect("route pattern is valid")
});

/// Identity of a reading position. Series and chapter are fixed for the
/// lifetime of a session; `page` is the page requested on entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChapterRoute {
    pub series_id: String,
    pub chapter_id: u32,
    pub page: usize,
}

impl ChapterRoute {
    pub fn new(series_id: impl Into<String>, chapter_id: u32, page: usize) -> Result<Self> {
        let series_id = series_id.into();
        validate_series_id(&series_id)?;
        validate_chapter_id(chapter_id)?;
        Ok(Self {
            series_id,
            chapter_id,
            page,
        })
    }

    /// Same chapter, different requested page.
    pub fn at_page(&self, page: usize) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub fn same_chapter(&self, other: &ChapterRoute) -> bool {
        self.series_id == other.series_id && self.chapter_id == other.chapter_id
    }
}

pub fn validate_series_id(series_id: &str) -> Result<()> {
    if series_id.trim().is_empty() {
        return Err(ReaderError::validation("series_id", "must not be empty"));
    }
    if series_id.contains('/') {
        return Err(ReaderError::validation(
            "series_id",
            format!("must not contain '/': {series_id}"),
        ));
    }
    if matches!(series_id, "." | "..") {
        return Err(ReaderError::validation(
            "series_id",
            format!("must not be a relative path component: {series_id}"),
        ));
    }
    Ok(())
}

pub fn validate_chapter_id(chapter_id: u32) -> Result<()> {
    if chapter_id == 0 {
        return Err(ReaderError::validation("chapter_id", "must be positive"));
    }
    Ok(())
}

impl fmt::Display for ChapterRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/reader/{}/{}/{}",
            self.series_id, self.chapter_id, self.page
        )
    }
}

impl FromStr for ChapterRoute {
    type Err = ReaderError;

    fn from_str(raw: &str) -> Result<Self> {
        let caps = ROUTE_RE
            .captures(raw.trim())
            .ok_or_else(|| ReaderError::validation("route", format!("unrecognized: {raw}")))?;
        let chapter_id = caps["chapter"]
            .parse::<u32>()
            .map_err(|err| ReaderError::validation("chapter_id", err.to_string()))?;
        let page = match caps.name("page") {
            Some(page) => page
                .as_str()
                .parse::<usize>()
                .map_err(|err| ReaderError::validation("page", err.to_string()))?,
            None => 0,
        };
        ChapterRoute::new(&caps["series"], chapter_id, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_route() {
        let route: ChapterRoute = "/reader/Naruto/5/3".parse().expect("route should parse");
        assert_eq!(route, ChapterRoute::new("Naruto", 5, 3).unwrap());
        assert_eq!(route.to_string(), "/reader/Naruto/5/3");
    }

    #[test]
    fn page_defaults_to_zero() {
        let route: ChapterRoute = "/reader/One Piece/12".parse().expect("route should parse");
        assert_eq!(route.series_id, "One Piece");
        assert_eq!(route.chapter_id, 12);
        assert_eq!(route.page, 0);
    }

    #[test]
    fn rejects_malformed_routes() {
        assert!("/reader/Naruto".parse::<ChapterRoute>().is_err());
        assert!("/library/Naruto/1/0".parse::<ChapterRoute>().is_err());
        assert!("/reader/Naruto/x/0".parse::<ChapterRoute>().is_err());
        assert!("/reader/Naruto/99999999999/0".parse::<ChapterRoute>().is_err());
    }

    #[test]
    fn chapter_zero_is_a_validation_failure() {
        let err = "/reader/Naruto/0/0".parse::<ChapterRoute>().unwrap_err();
        assert_eq!(
            err,
            ReaderError::validation("chapter_id", "must be positive")
        );
    }

    #[test]
    fn dot_components_are_not_series() {
        assert!(ChapterRoute::new("..", 1, 0).is_err());
        assert!(ChapterRoute::new(".", 1, 0).is_err());
        assert!("/reader/../5/3".parse::<ChapterRoute>().is_err());
        assert!(ChapterRoute::new("..Naruto", 1, 0).is_ok());
    }

    #[test]
    fn blank_series_is_rejected() {
        assert!(ChapterRoute::new("  ", 1, 0).is_err());
        assert!(ChapterRoute::new("a/b", 1, 0).is_err());
    }
}
