use crate::api::models::{QualityTier, SongInfo, Track};
use crate::lyrics::{LyricCursor, LyricLine};
use crate::quality::ResolvedUrlMap;

/// Everything known about the track that is currently loaded.
///
/// There is exactly one live session; loading another track replaces it
/// wholesale, so nothing from a previous track leaks into the next one.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub track: Track,
    pub info: SongInfo,
    pub tier: QualityTier,
    pub urls: ResolvedUrlMap,
    pub lyrics: Vec<LyricLine>,
    /// Raw lyric text as fetched, kept for downloads when nothing parsed.
    pub raw_lyrics: Option<String>,
    pub cursor: LyricCursor,
    /// Last reported playback position in seconds.
    pub position: f64,
    /// URL handed to the player for the current tier.
    pub playing_url: Option<String>,
}

impl PlaybackSession {
    pub fn new(track: Track, tier: QualityTier) -> Self {
        Self {
            track,
            info: SongInfo::default(),
            tier,
            urls: ResolvedUrlMap::new(),
            lyrics: Vec::new(),
            raw_lyrics: None,
            cursor: LyricCursor::default(),
            position: 0.0,
            playing_url: None,
        }
    }

    /// Line to highlight at `time`, only when it changed.
    pub fn lyric_update(&mut self, time: f64) -> Option<&LyricLine> {
        self.position = time;
        let idx = self.cursor.advance(time, &self.lyrics)?;
        self.lyrics.get(idx)
    }

    pub fn has_lyrics(&self) -> bool {
        !self.lyrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Provider;
    use crate::lyrics::parser::parse;
    use crate::quality::tests::make_track;

    #[test]
    fn test_lyric_update_only_on_change() {
        let mut s = PlaybackSession::new(make_track("1", Provider::Qq), QualityTier::High);
        assert!(s.lyric_update(1.0).is_none());

        s.lyrics = parse("[00:01.00]a\n[00:02.00]b");
        assert_eq!(s.lyric_update(1.2).map(|l| l.content.as_str()), Some("a"));
        assert!(s.lyric_update(1.4).is_none());
        assert_eq!(s.lyric_update(2.1).map(|l| l.content.as_str()), Some("b"));
        assert_eq!(s.position, 2.1);
    }
}
