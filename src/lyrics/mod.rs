//! Synchronized lyrics
//!
//! This module provides:
//! - LRC parsing and serialization
//! - Active-line lookup with a change-only cursor and a time-update throttle
//! - Fetching the lyric source for a track

pub mod parser;
pub mod sync;

pub use parser::LyricLine;
pub use sync::{LyricCursor, LyricThrottle, active_index_at};

use crate::api::models::SongInfo;
use crate::api::{ApiClient, ApiError};
use std::future::Future;

/// Where lyric text is downloaded from.
pub trait LyricSource {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, ApiError>> + Send;
}

impl LyricSource for ApiClient {
    async fn fetch_text(&self, url: &str) -> Result<String, ApiError> {
        ApiClient::fetch_text(self, url).await
    }
}

/// Fetch and parse the lyrics advertised by `info`.
///
/// Missing or unreachable lyrics are not an error for playback; the caller
/// gets an empty list and the raw text, if any was fetched. Files saved by
/// `dl` (timestamp and text on separate lines) parse too.
pub async fn fetch_lyrics<S: LyricSource>(
    client: &S,
    info: &SongInfo,
) -> (Vec<LyricLine>, Option<String>) {
    let Some(src) = info.lrc.as_deref().filter(|s| !s.is_empty()) else {
        return (Vec::new(), None);
    };

    // some providers inline the LRC text instead of linking to it
    if src.trim_start().starts_with('[') {
        return (parser::parse_exported(src), Some(src.to_string()));
    }

    match client.fetch_text(src).await {
        Ok(text) => (parser::parse_exported(&text), Some(text)),
        Err(e) => {
            tracing::warn!(url = src, error = %e, "lyrics fetch failed");
            (Vec::new(), None)
        }
    }
}
