//! Audio output.
//!
//! Playback runs in an external `mpv` process; the controller only talks to
//! it through [`Player`], so tests can substitute a recorder.

pub mod mpv;

pub use mpv::MpvHandle;

use std::future::Future;

pub trait Player {
    /// Replace the current file, optionally starting at `start` seconds.
    fn load(&self, url: &str, start: Option<f64>) -> impl Future<Output = anyhow::Result<()>>;
    fn toggle_pause(&self) -> impl Future<Output = anyhow::Result<()>>;
    fn seek_relative(&self, seconds: f64) -> impl Future<Output = anyhow::Result<()>>;
    fn set_volume(&self, volume: u8) -> impl Future<Output = anyhow::Result<()>>;
    fn stop(&self) -> impl Future<Output = anyhow::Result<()>>;
}
