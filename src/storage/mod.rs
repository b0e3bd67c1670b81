use crate::api::models::{QualityTier, Track};
use crate::queue::PlayMode;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub mod export;
pub mod library;
pub mod stats;

pub use export::ExportData;
pub use library::{LibraryError, Playlist, PlaylistSong};
pub use stats::{PlayStatistics, Recommendation, StatsSummary, TrackStats};

/// Entries returned by [`Storage::history`] and kept on disk.
pub const HISTORY_LIMIT: usize = 50;

pub(crate) const KEY_PLAYLISTS: &str = "playlists";
pub(crate) const KEY_STATISTICS: &str = "playStatistics";

/// User preferences stored as plain strings next to the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Theme,
    PlayMode,
    PreferredQuality,
    PreferredVolume,
}

impl Setting {
    pub fn key(self) -> &'static str {
        match self {
            Setting::Theme => "theme",
            Setting::PlayMode => "playMode",
            Setting::PreferredQuality => "preferredQuality",
            Setting::PreferredVolume => "preferredVolume",
        }
    }

    /// Check a user-supplied value and return the form that gets stored.
    pub fn normalize(self, value: &str) -> anyhow::Result<String> {
        let value = value.trim();
        let stored = match self {
            Setting::Theme => match value.to_ascii_lowercase().as_str() {
                t @ ("light" | "dark") => t.to_string(),
                _ => anyhow::bail!("theme must be `light` or `dark`"),
            },
            Setting::PlayMode => value.parse::<PlayMode>()?.as_str().to_string(),
            Setting::PreferredQuality => value.parse::<QualityTier>()?.as_str().to_string(),
            Setting::PreferredVolume => match value.parse::<u8>() {
                Ok(v) if v <= 100 => v.to_string(),
                _ => anyhow::bail!("volume must be between 0 and 100"),
            },
        };
        Ok(stored)
    }
}

impl FromStr for Setting {
    type Err = crate::api::models::UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match norm.as_str() {
            "theme" => Ok(Setting::Theme),
            "playmode" | "mode" => Ok(Setting::PlayMode),
            "preferredquality" | "quality" => Ok(Setting::PreferredQuality),
            "preferredvolume" | "volume" => Ok(Setting::PreferredVolume),
            _ => Err(crate::api::models::UnknownVariant::new(
                "setting",
                s,
                &["theme", "play-mode", "quality", "volume"],
            )),
        }
    }
}

/// One row of play history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub song: Track,
    pub played_at: String,
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory db")?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS play_history (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  track_id TEXT NOT NULL,
  track_json TEXT NOT NULL,
  played_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_track_id ON play_history(track_id);
"#,
            )
            .context("init schema")?;
        Ok(())
    }

    pub fn setting(&self, setting: Setting) -> anyhow::Result<Option<String>> {
        get_value(&self.conn, setting.key())
    }

    pub fn set_setting(&self, setting: Setting, value: &str) -> anyhow::Result<()> {
        put_value(&self.conn, setting.key(), value)
    }

    /// Record a started track. The table never grows past [`HISTORY_LIMIT`].
    pub fn add_to_history(&self, track: &Track, played_at: OffsetDateTime) -> anyhow::Result<()> {
        let track_json = serde_json::to_string(track).context("serialize history track")?;
        let played_at = played_at.format(&Rfc3339).context("format played_at")?;
        self.conn
            .execute(
                r#"
INSERT INTO play_history(track_id, track_json, played_at)
VALUES(?1, ?2, ?3)
"#,
                params![track.id, track_json, played_at],
            )
            .context("add to history")?;
        self.conn
            .execute(
                r#"
DELETE FROM play_history
WHERE id NOT IN (SELECT id FROM play_history ORDER BY id DESC LIMIT ?1)
"#,
                params![HISTORY_LIMIT as i64],
            )
            .context("trim history")?;
        Ok(())
    }

    /// Play history, most recent first.
    pub fn history(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT track_json, played_at
FROM play_history
ORDER BY id DESC
LIMIT ?1
"#,
        )?;

        let entries = stmt
            .query_map(params![HISTORY_LIMIT as i64], |row| {
                let track_json: String = row.get(0)?;
                let played_at: String = row.get(1)?;
                Ok((track_json, played_at))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(json, played_at)| {
                serde_json::from_str(&json)
                    .ok()
                    .map(|song| HistoryEntry { song, played_at })
            })
            .collect();

        Ok(entries)
    }

    /// Raw JSON of the playlists, as written by the library. Empty when
    /// nothing was ever saved.
    pub fn backup(&self) -> anyhow::Result<String> {
        Ok(get_value(&self.conn, KEY_PLAYLISTS)?.unwrap_or_default())
    }

    /// Forget playlists and statistics. History and settings stay.
    pub fn clear_all(&self) -> anyhow::Result<()> {
        self.conn
            .execute(
                "DELETE FROM kv WHERE key IN (?1, ?2)",
                params![KEY_PLAYLISTS, KEY_STATISTICS],
            )
            .context("clear data")?;
        Ok(())
    }

    pub(crate) fn get_json<T: serde::de::DeserializeOwned + Default>(
        &self,
        key: &str,
    ) -> anyhow::Result<T> {
        match get_value(&self.conn, key)? {
            Some(raw) => serde_json::from_str(&raw).with_context(|| format!("decode {key}")),
            None => Ok(T::default()),
        }
    }

    pub(crate) fn put_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let raw = serde_json::to_string(value).with_context(|| format!("encode {key}"))?;
        put_value(&self.conn, key, &raw)
    }
}

pub(crate) fn get_value(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    conn.query_row("SELECT value FROM kv WHERE key=?1", params![key], |row| {
        row.get(0)
    })
    .optional()
    .with_context(|| format!("read {key}"))
}

pub(crate) fn put_value(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        r#"
INSERT INTO kv(key, value)
VALUES(?1, ?2)
ON CONFLICT(key) DO UPDATE SET
  value=excluded.value
"#,
        params![key, value],
    )
    .with_context(|| format!("write {key}"))?;
    Ok(())
}

pub(crate) fn now_rfc3339(now: OffsetDateTime) -> String {
    now.format(&Rfc3339).unwrap_or_default()
}
