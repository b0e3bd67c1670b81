use super::{ApiConfig, Config, FallbackConfig, PathsConfig, PlaybackConfig, PlayerConfig};
use directories::{ProjectDirs, UserDirs};
use std::path::PathBuf;

pub const API_BASE: &str = "https://music-dl.sayqz.com";
pub const USER_AGENT: &str = "tunehub/0.1 (+https://github.com/tunehub)";
pub const LYRIC_THROTTLE_MS: u64 = 50;

pub fn data_dir() -> PathBuf {
    ProjectDirs::from("dev", "tunehub", "tunehub")
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("tunehub"))
}

pub fn download_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|u| u.download_dir().map(|d| d.join("tunehub")))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn defaults() -> Config {
    Config {
        api: ApiConfig::default(),
        playback: PlaybackConfig::default(),
        fallback: FallbackConfig::default(),
        player: PlayerConfig::default(),
        paths: PathsConfig::default(),
    }
}
