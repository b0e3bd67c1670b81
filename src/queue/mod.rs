use crate::api::models::{Track, UnknownVariant};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the queue moves on when a track ends or the user skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Play through once and stop
    #[default]
    Normal,
    /// Repeat the current track when it ends
    Single,
    /// Wrap around at both ends
    Loop,
    /// Random order, starting from the current track
    Shuffle,
}

impl PlayMode {
    pub const ALL: [PlayMode; 4] = [
        PlayMode::Normal,
        PlayMode::Single,
        PlayMode::Loop,
        PlayMode::Shuffle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlayMode::Normal => "normal",
            PlayMode::Single => "single",
            PlayMode::Loop => "loop",
            PlayMode::Shuffle => "shuffle",
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlayMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                UnknownVariant::new("play mode", s, &PlayMode::ALL.map(PlayMode::as_str))
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    current_index: Option<usize>,
    mode: PlayMode,
    shuffle_order: Vec<usize>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single track to the end of the queue.
    ///
    /// In shuffle mode the new track is slotted somewhere after the current
    /// one, leaving the order already walked untouched.
    pub fn add(&mut self, track: Track) {
        self.tracks.push(track);
        let index = self.tracks.len() - 1;
        if self.mode != PlayMode::Shuffle || self.shuffle_order.is_empty() {
            self.rebuild_shuffle_order();
            return;
        }

        let after = self
            .current_index
            .and_then(|c| self.shuffle_order.iter().position(|&x| x == c))
            .map_or(0, |pos| pos + 1);
        let at = rand::rng().random_range(after..=self.shuffle_order.len());
        self.shuffle_order.insert(at, index);
    }

    /// Replace the entire queue with new tracks and start playing from the beginning
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.current_index = if self.tracks.is_empty() { None } else { Some(0) };
        self.rebuild_shuffle_order();
    }

    /// Swap the current track in place, used when a substitute from another
    /// provider takes over.
    pub fn replace_current(&mut self, track: Track) {
        if let Some(slot) = self.current_index.and_then(|i| self.tracks.get_mut(i)) {
            *slot = track;
        }
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
        self.rebuild_shuffle_order();
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    /// Set the current playing index
    pub fn set_current(&mut self, index: usize) {
        if index < self.tracks.len() {
            self.current_index = Some(index);
            self.rebuild_shuffle_order();
        }
    }

    /// Get the current track
    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.tracks.get(i))
    }

    /// Get the current index
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// The current track finished on its own. Single mode replays it.
    pub fn on_track_end(&mut self) -> Option<&Track> {
        if self.mode == PlayMode::Single {
            return self.current_track();
        }
        self.advance()
    }

    /// Skip forward, returns the new current track
    pub fn advance(&mut self) -> Option<&Track> {
        let current = self.current_index?;
        let next_index = self.next_index(current)?;
        self.current_index = Some(next_index);
        self.tracks.get(next_index)
    }

    /// Go to the previous track, returns the new current track
    pub fn go_back(&mut self) -> Option<&Track> {
        let current = self.current_index?;
        let prev_index = self.prev_index(current)?;
        self.current_index = Some(prev_index);
        self.tracks.get(prev_index)
    }

    /// Get all tracks in the queue
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Get the number of tracks in the queue
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn next_index(&self, current: usize) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        match self.mode {
            PlayMode::Shuffle if !self.shuffle_order.is_empty() => {
                let pos = self.shuffle_order.iter().position(|&x| x == current)?;
                self.shuffle_order.get(pos + 1).copied()
            }
            PlayMode::Loop => Some((current + 1) % len),
            _ => (current + 1 < len).then_some(current + 1),
        }
    }

    fn prev_index(&self, current: usize) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        match self.mode {
            PlayMode::Shuffle if !self.shuffle_order.is_empty() => {
                let pos = self.shuffle_order.iter().position(|&x| x == current)?;
                pos.checked_sub(1).map(|p| self.shuffle_order[p])
            }
            PlayMode::Loop => Some((current + len - 1) % len),
            _ => current.checked_sub(1),
        }
    }

    fn rebuild_shuffle_order(&mut self) {
        if self.mode != PlayMode::Shuffle || self.tracks.is_empty() {
            self.shuffle_order.clear();
            return;
        }

        let mut rng = rand::rng();
        self.shuffle_order = (0..self.tracks.len()).collect();
        self.shuffle_order.shuffle(&mut rng);

        // the current track leads the shuffled order
        if let Some(current) = self.current_index
            && let Some(pos) = self.shuffle_order.iter().position(|&x| x == current)
        {
            self.shuffle_order.swap(0, pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Provider;
    use crate::quality::tests::make_track as track_on;

    fn make_track(id: &str) -> Track {
        track_on(id, Provider::Netease)
    }

    fn three() -> Queue {
        let mut queue = Queue::new();
        queue.replace(vec![make_track("1"), make_track("2"), make_track("3")]);
        queue
    }

    #[test]
    fn test_add_and_len() {
        let mut queue = Queue::new();
        assert!(queue.is_empty());

        queue.add(make_track("1"));
        assert_eq!(queue.len(), 1);

        queue.add(make_track("2"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_replace() {
        let mut queue = Queue::new();
        queue.add(make_track("1"));

        queue.replace(vec![make_track("2"), make_track("3")]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn test_normal_mode_stops_at_ends() {
        let mut queue = three();

        assert_eq!(queue.current_track().unwrap().id, "1");
        assert!(queue.go_back().is_none());
        queue.advance();
        assert_eq!(queue.current_track().unwrap().id, "2");
        queue.advance();
        assert_eq!(queue.current_track().unwrap().id, "3");
        assert!(queue.advance().is_none());
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn test_loop_mode_wraps_both_ways() {
        let mut queue = three();
        queue.set_mode(PlayMode::Loop);

        assert_eq!(queue.go_back().unwrap().id, "3");
        assert_eq!(queue.advance().unwrap().id, "1");
    }

    #[test]
    fn test_single_mode_repeats_on_end_only() {
        let mut queue = three();
        queue.set_mode(PlayMode::Single);

        assert_eq!(queue.on_track_end().unwrap().id, "1");
        assert_eq!(queue.advance().unwrap().id, "2");
    }

    #[test]
    fn test_shuffle_visits_every_track_once() {
        let mut queue = three();
        queue.set_current(1);
        queue.set_mode(PlayMode::Shuffle);

        let mut seen = vec![queue.current_track().unwrap().id.clone()];
        while let Some(t) = queue.advance() {
            seen.push(t.id.clone());
        }
        assert_eq!(seen[0], "2");
        seen.sort();
        assert_eq!(seen, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_add_while_shuffling_keeps_walked_order() {
        for _ in 0..20 {
            let mut queue = three();
            queue.set_mode(PlayMode::Shuffle);
            let mut seen = vec![queue.current_track().unwrap().id.clone()];
            seen.push(queue.advance().unwrap().id.clone());
            let walked = queue.shuffle_order[..2].to_vec();

            queue.add(make_track("4"));
            assert_eq!(queue.shuffle_order[..2], walked[..]);

            while let Some(t) = queue.advance() {
                seen.push(t.id.clone());
            }
            seen.sort();
            assert_eq!(seen, vec!["1", "2", "3", "4"]);
        }
    }

    #[test]
    fn test_replace_current_keeps_position() {
        let mut queue = three();
        queue.advance();
        queue.replace_current(track_on("qq-2", Provider::Qq));
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(queue.current_track().unwrap().id, "qq-2");
    }

    #[test]
    fn test_play_mode_parse() {
        assert_eq!("LOOP".parse::<PlayMode>().unwrap(), PlayMode::Loop);
        assert!("repeat".parse::<PlayMode>().is_err());
    }
}
