use crate::api::models::{Provider, QualityTier};
use crate::quality::fallback::FallbackRoute;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod defaults;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub playback: PlaybackConfig,
    pub fallback: FallbackConfig,
    pub player: PlayerConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Upstream base URL; requests go to `{base_url}/api/`.
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Tiers probed on preload, in fallback order.
    pub tiers: Vec<QualityTier>,
    /// Minimum interval between lyric highlight evaluations.
    pub lyric_throttle_ms: u64,
    /// Provider used by `search` when none is given on the command line.
    pub default_provider: Provider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Cross-provider routes tried when every tier of a track fails.
    pub routes: Vec<FallbackRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PlayerConfig {
    /// mpv audio device name (see `mpv --audio-device=help`)
    pub audio_device: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    /// Target of the interactive `dl` command.
    pub download_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        defaults::defaults()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_BASE.to_string(),
            timeout_secs: 15,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tiers: QualityTier::ALL.to_vec(),
            lyric_throttle_ms: defaults::LYRIC_THROTTLE_MS,
            default_provider: Provider::Netease,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            routes: vec![FallbackRoute {
                from: Provider::Kuwo,
                to: Provider::Qq,
            }],
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            download_dir: defaults::download_dir(),
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj =
        ProjectDirs::from("dev", "tunehub", "tunehub").context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        let cfg = defaults::defaults();
        write_config(&cfg, &path)?;
        tracing::info!(path = %path.display(), "wrote default config");
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    parse(&raw).with_context(|| format!("parse {}", path.display()))
}

fn parse(raw: &str) -> anyhow::Result<Config> {
    let mut cfg = toml::from_str::<Config>(raw)?;
    cfg.playback.normalize_tiers();
    Ok(cfg)
}

impl PlaybackConfig {
    /// Drop repeated tiers; an empty list means every tier in default order.
    fn normalize_tiers(&mut self) {
        let mut seen = Vec::with_capacity(self.tiers.len());
        self.tiers.retain(|t| {
            let first = !seen.contains(t);
            seen.push(*t);
            first
        });
        if self.tiers.is_empty() {
            self.tiers = QualityTier::ALL.to_vec();
        }
    }
}

fn write_config(cfg: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}
