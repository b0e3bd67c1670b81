//! Play statistics and the recommendations derived from them.

use super::{KEY_STATISTICS, Storage, now_rfc3339};
use crate::api::models::Track;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{Date, OffsetDateTime};

/// Number of recommendations shown.
const RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStats {
    #[serde(default)]
    pub count: u64,
    /// Seconds listened in total.
    #[serde(default)]
    pub total_play_time: f64,
    #[serde(default)]
    pub last_played: Option<String>,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
}

/// Per-track counters keyed by track id, plus a counter for today.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayStatistics {
    #[serde(default)]
    pub today: u64,
    /// Day `today` counts for, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_date: Option<String>,
    #[serde(flatten)]
    pub tracks: BTreeMap<String, TrackStats>,
}

impl PlayStatistics {
    fn roll_day(&mut self, date: Date) {
        let key = date.to_string();
        if self.today_date.as_deref() != Some(key.as_str()) {
            self.today = 0;
            self.today_date = Some(key);
        }
    }

    fn entry(&mut self, track: &Track) -> &mut TrackStats {
        let stats = self.tracks.entry(track.id.clone()).or_default();
        stats.name = Some(track.name.clone());
        stats.artist = Some(track.artist.clone());
        stats
    }

    /// Today's play count, zero once the recorded day has passed.
    pub fn today_count(&self, date: Date) -> u64 {
        if self.today_date.as_deref() == Some(date.to_string().as_str()) {
            self.today
        } else {
            0
        }
    }

    pub fn summary(&self, date: Date) -> StatsSummary {
        let total_seconds: f64 = self.tracks.values().map(|s| s.total_play_time).sum();
        StatsSummary {
            total_plays: self.tracks.values().map(|s| s.count).sum(),
            today_plays: self.today_count(date),
            total_minutes: (total_seconds / 60.0).floor() as u64,
            favorites: self.tracks.values().filter(|s| s.favorite_count > 0).count(),
        }
    }

    /// The most played tracks, or fixed suggestions while fewer than three
    /// tracks were ever played.
    pub fn recommendations(&self) -> Vec<Recommendation> {
        if self.tracks.len() < RECOMMENDATIONS {
            return placeholder_recommendations();
        }

        let mut played: Vec<(&String, &TrackStats)> = self.tracks.iter().collect();
        played.sort_by(|a, b| b.1.count.cmp(&a.1.count));
        played
            .into_iter()
            .take(RECOMMENDATIONS)
            .map(|(id, s)| Recommendation {
                name: s.name.clone().unwrap_or_else(|| id.clone()),
                artist: s.artist.clone().unwrap_or_default(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSummary {
    pub total_plays: u64,
    pub today_plays: u64,
    pub total_minutes: u64,
    pub favorites: usize,
}

/// A suggestion to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub name: String,
    pub artist: String,
}

impl Recommendation {
    pub fn keyword(&self) -> String {
        format!("{} {}", self.name, self.artist).trim().to_string()
    }
}

fn placeholder_recommendations() -> Vec<Recommendation> {
    [
        ("Popular songs", "Editor's picks"),
        ("Discover music", "Made for you"),
        ("Daily mix", "Based on your taste"),
    ]
    .into_iter()
    .map(|(name, artist)| Recommendation {
        name: name.to_string(),
        artist: artist.to_string(),
    })
    .collect()
}

impl Storage {
    pub fn statistics(&self) -> anyhow::Result<PlayStatistics> {
        self.get_json(KEY_STATISTICS)
    }

    /// Count a started track.
    pub fn record_play(&self, track: &Track, now: OffsetDateTime) -> anyhow::Result<()> {
        let mut stats = self.statistics()?;
        stats.roll_day(now.date());
        stats.today += 1;
        let entry = stats.entry(track);
        entry.count += 1;
        entry.last_played = Some(now_rfc3339(now));
        self.put_json(KEY_STATISTICS, &stats)
    }

    /// Add listened time when leaving a track.
    pub fn add_play_time(&self, track: &Track, seconds: f64) -> anyhow::Result<()> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Ok(());
        }
        let mut stats = self.statistics()?;
        stats.entry(track).total_play_time += seconds;
        self.put_json(KEY_STATISTICS, &stats)
    }

    pub fn mark_favorite(&self, track: &Track) -> anyhow::Result<u64> {
        let mut stats = self.statistics()?;
        let entry = stats.entry(track);
        entry.favorite_count += 1;
        let count = entry.favorite_count;
        self.put_json(KEY_STATISTICS, &stats)?;
        Ok(count)
    }
}
