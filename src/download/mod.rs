//! Saving the current track's audio, lyrics and cover to disk.

use crate::api::models::{QualityTier, Track};
use crate::api::{ApiClient, ApiError};
use crate::lyrics::{LyricLine, parser};
use anyhow::Context;
use std::future::Future;
use std::path::{Path, PathBuf};

const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DownloadKind {
    Audio,
    Lyrics,
    Cover,
    /// Audio and lyrics
    Song,
    All,
}

impl DownloadKind {
    fn audio(self) -> bool {
        matches!(self, Self::Audio | Self::Song | Self::All)
    }

    fn lyrics(self) -> bool {
        matches!(self, Self::Lyrics | Self::Song | Self::All)
    }

    fn cover(self) -> bool {
        matches!(self, Self::Cover | Self::All)
    }
}

/// Binary downloads.
pub trait ByteSource {
    fn fetch_bytes(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send;
}

impl ByteSource for ApiClient {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        ApiClient::fetch_bytes(self, url).await
    }
}

/// What is known about a track at download time.
#[derive(Debug, Clone)]
pub struct DownloadSource<'a> {
    pub track: &'a Track,
    pub tier: QualityTier,
    pub audio_url: Option<&'a str>,
    pub lyrics: &'a [LyricLine],
    pub raw_lyrics: Option<&'a str>,
    pub cover_url: Option<&'a str>,
}

/// Strip characters most filesystems reject, turn whitespace runs into `_`
/// and cap the length.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
            continue;
        }
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out.chars().take(MAX_NAME_CHARS).collect()
}

pub fn file_stem(track: &Track, fallback: &str) -> String {
    let name = if track.name.is_empty() {
        fallback
    } else {
        &track.name
    };
    format!(
        "{}_{}",
        sanitize_file_name(name),
        sanitize_file_name(&track.artist)
    )
}

/// LRC text to save: the parsed lines when there are any, else the raw text.
pub fn lyrics_text(lyrics: &[LyricLine], raw: Option<&str>) -> Option<String> {
    if !lyrics.is_empty() {
        return Some(parser::serialize(lyrics));
    }
    raw.filter(|r| !r.trim().is_empty()).map(str::to_string)
}

/// Save the requested parts concurrently and return the written paths.
pub async fn download<C: ByteSource>(
    client: &C,
    src: &DownloadSource<'_>,
    kind: DownloadKind,
    dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create dir {}", dir.display()))?;

    let (audio, lyrics, cover) = tokio::join!(
        save_audio(client, src, kind, dir),
        save_lyrics(src, kind, dir),
        save_cover(client, src, kind, dir),
    );

    [audio, lyrics, cover]
        .into_iter()
        .filter_map(Result::transpose)
        .collect()
}

async fn save_audio<C: ByteSource>(
    client: &C,
    src: &DownloadSource<'_>,
    kind: DownloadKind,
    dir: &Path,
) -> anyhow::Result<Option<PathBuf>> {
    if !kind.audio() {
        return Ok(None);
    }
    let url = src.audio_url.context("no playable audio to download")?;
    let path = dir.join(format!(
        "{}.{}",
        file_stem(src.track, "music"),
        src.tier.extension()
    ));
    let bytes = client
        .fetch_bytes(url)
        .await
        .context("audio download failed")?;
    write_file(&path, &bytes).await.map(Some)
}

async fn save_lyrics(
    src: &DownloadSource<'_>,
    kind: DownloadKind,
    dir: &Path,
) -> anyhow::Result<Option<PathBuf>> {
    if !kind.lyrics() {
        return Ok(None);
    }
    let text = lyrics_text(src.lyrics, src.raw_lyrics).context("no lyrics to download")?;
    let path = dir.join(format!("{}.lrc", file_stem(src.track, "lyrics")));
    write_file(&path, text.as_bytes()).await.map(Some)
}

async fn save_cover<C: ByteSource>(
    client: &C,
    src: &DownloadSource<'_>,
    kind: DownloadKind,
    dir: &Path,
) -> anyhow::Result<Option<PathBuf>> {
    if !kind.cover() {
        return Ok(None);
    }
    let url = src.cover_url.context("no cover to download")?;
    let path = dir.join(format!("{}.jpg", file_stem(src.track, "cover")));
    let bytes = client
        .fetch_bytes(url)
        .await
        .context("cover download failed")?;
    write_file(&path, &bytes).await.map(Some)
}

async fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "saved");
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::api::models::Provider;
    use crate::quality::tests::make_track;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a<b>c:d\"e/f\\g|h?i*j"), "abcdefghij");
        assert_eq!(sanitize_file_name("  Sunny   Day \t"), "_Sunny_Day_");
        assert_eq!(sanitize_file_name("AC/DC: Live"), "ACDC_Live");

        let long = "x".repeat(150);
        assert_eq!(sanitize_file_name(&long).chars().count(), 100);
        let wide = "晴".repeat(120);
        assert_eq!(sanitize_file_name(&wide).chars().count(), 100);
    }

    #[test]
    fn test_file_stem() {
        let t = make_track("1", Provider::Qq);
        assert_eq!(file_stem(&t, "music"), "Sunny_Day_Jay_Chou");

        let mut nameless = t.clone();
        nameless.name.clear();
        nameless.artist.clear();
        assert_eq!(file_stem(&nameless, "cover"), "cover_");
    }

    #[test]
    fn test_lyrics_text_prefers_parsed_lines() {
        let lines = parser::parse("[00:01.00]hi");
        assert_eq!(
            lyrics_text(&lines, Some("raw")).as_deref(),
            Some("[00:01.00]\nhi\n\n")
        );
        assert_eq!(lyrics_text(&[], Some("plain words")).as_deref(), Some("plain words"));
        assert_eq!(lyrics_text(&[], Some("  ")), None);
        assert_eq!(lyrics_text(&[], None), None);
    }

    #[tokio::test]
    async fn test_download_lyrics_only_writes_lrc() {
        let dir = std::env::temp_dir().join(format!("tunehub-dl-{}", std::process::id()));
        let client = ApiClient::new(&ApiConfig::default()).unwrap();
        let track = make_track("1", Provider::Kuwo);
        let lines = parser::parse("[00:01.00]hi\n[00:02.50]there");
        let src = DownloadSource {
            track: &track,
            tier: QualityTier::High,
            audio_url: None,
            lyrics: &lines,
            raw_lyrics: None,
            cover_url: None,
        };

        let paths = download(&client, &src, DownloadKind::Lyrics, &dir)
            .await
            .unwrap();
        assert_eq!(paths, vec![dir.join("Sunny_Day_Jay_Chou.lrc")]);
        let saved = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(saved, "[00:01.00]\nhi\n\n[00:02.50]\nthere\n\n");

        let err = download(&client, &src, DownloadKind::Audio, &dir)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no playable audio"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
