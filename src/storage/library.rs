//! Named playlists, stored as one JSON object keyed by playlist name.

use super::{KEY_PLAYLISTS, Storage, now_rfc3339};
use crate::api::models::Track;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use time::OffsetDateTime;

pub type Playlists = BTreeMap<String, Playlist>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub name: String,
    #[serde(default)]
    pub songs: Vec<PlaylistSong>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSong {
    #[serde(flatten)]
    pub track: Track,
    #[serde(default)]
    pub added_at: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("playlist name must not be empty")]
    EmptyName,
    #[error("playlist `{0}` already exists")]
    PlaylistExists(String),
    #[error("no playlist named `{0}`")]
    NoSuchPlaylist(String),
    #[error("`{song}` is already in `{playlist}`")]
    AlreadyInPlaylist { playlist: String, song: String },
    #[error("no song `{id}` in `{playlist}`")]
    NoSuchSong { playlist: String, id: String },
}

impl Storage {
    pub fn playlists(&self) -> anyhow::Result<Playlists> {
        self.get_json(KEY_PLAYLISTS)
    }

    pub fn playlist(&self, name: &str) -> anyhow::Result<Playlist> {
        self.playlists()?
            .remove(name)
            .ok_or_else(|| LibraryError::NoSuchPlaylist(name.to_string()).into())
    }

    pub fn create_playlist(&self, name: &str, now: OffsetDateTime) -> anyhow::Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::EmptyName.into());
        }
        let mut all = self.playlists()?;
        if all.contains_key(name) {
            return Err(LibraryError::PlaylistExists(name.to_string()).into());
        }
        all.insert(
            name.to_string(),
            Playlist {
                name: name.to_string(),
                songs: Vec::new(),
                created_at: now_rfc3339(now),
            },
        );
        self.put_json(KEY_PLAYLISTS, &all)?;
        tracing::info!(playlist = name, "created playlist");
        Ok(())
    }

    pub fn delete_playlist(&self, name: &str) -> anyhow::Result<()> {
        let mut all = self.playlists()?;
        if all.remove(name).is_none() {
            return Err(LibraryError::NoSuchPlaylist(name.to_string()).into());
        }
        self.put_json(KEY_PLAYLISTS, &all)
    }

    /// Append `track` unless a song with the same id is already there.
    pub fn add_to_playlist(
        &self,
        name: &str,
        track: &Track,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let mut all = self.playlists()?;
        let playlist = all
            .get_mut(name)
            .ok_or_else(|| LibraryError::NoSuchPlaylist(name.to_string()))?;
        if playlist.songs.iter().any(|s| s.track.id == track.id) {
            return Err(LibraryError::AlreadyInPlaylist {
                playlist: name.to_string(),
                song: track.name.clone(),
            }
            .into());
        }
        playlist.songs.push(PlaylistSong {
            track: track.clone(),
            added_at: now_rfc3339(now),
        });
        self.put_json(KEY_PLAYLISTS, &all)?;
        tracing::debug!(playlist = name, id = %track.id, "added song to playlist");
        Ok(())
    }

    pub fn remove_from_playlist(&self, name: &str, song_id: &str) -> anyhow::Result<()> {
        let mut all = self.playlists()?;
        let playlist = all
            .get_mut(name)
            .ok_or_else(|| LibraryError::NoSuchPlaylist(name.to_string()))?;
        let before = playlist.songs.len();
        playlist.songs.retain(|s| s.track.id != song_id);
        if playlist.songs.len() == before {
            return Err(LibraryError::NoSuchSong {
                playlist: name.to_string(),
                id: song_id.to_string(),
            }
            .into());
        }
        self.put_json(KEY_PLAYLISTS, &all)
    }
}
