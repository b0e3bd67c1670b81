mod api;
mod app;
mod config;
mod download;
mod input;
mod lyrics;
mod player;
mod quality;
mod queue;
mod session;
mod storage;

use crate::api::ApiClient;
use crate::api::models::{Provider, QualityTier, SearchScope, Track};
use crate::quality::QualityResolver;
use crate::storage::{Setting, Storage};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DB_FILE: &str = "tunehub.sqlite3";

#[derive(Debug, Parser)]
#[command(name = "tunehub", version, about = "Terminal client for a music aggregation API")]
struct Cli {
    /// Override config file path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search and play the results, with interactive commands on stdin.
    Play {
        #[command(flatten)]
        pick: Pick,
    },
    /// Search tracks and print them.
    Search {
        keyword: Vec<String>,
        /// Provider name or `aggregate`.
        #[arg(short, long)]
        source: Option<SearchScope>,
    },
    /// Probe every quality tier of a track and print the playable URLs.
    Resolve {
        id: String,
        #[arg(short, long)]
        provider: Provider,
    },
    /// Print the synchronized lyrics of a track or of a saved `.lrc` file.
    Lyrics {
        #[arg(required_unless_present = "file")]
        id: Option<String>,
        #[arg(short, long, required_unless_present = "file")]
        provider: Option<Provider>,
        /// Read a local `.lrc` file instead of asking the upstream.
        #[arg(long, conflicts_with_all = ["id", "provider"])]
        file: Option<PathBuf>,
        /// Only print the line active at this position (seconds).
        #[arg(long)]
        at: Option<f64>,
    },
    /// Save audio, lyrics or cover of a search result.
    Download {
        #[command(flatten)]
        pick: Pick,
        #[arg(short, long, value_enum, default_value = "song")]
        kind: download::DownloadKind,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
        /// Audio tier; defaults to the preferred quality.
        #[arg(short, long)]
        quality: Option<QualityTier>,
    },
    /// Manage playlists.
    Playlist {
        #[command(subcommand)]
        cmd: PlaylistCommand,
    },
    /// Listening statistics and recommendations.
    Stats,
    /// Recently played tracks.
    History,
    /// Write playlists, statistics, history and settings as JSON.
    Export {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Replace library data with the contents of an export file.
    Import { file: PathBuf },
    /// Dump the raw playlists JSON.
    Backup {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Delete all playlists and statistics.
    ClearData {
        #[arg(long)]
        yes: bool,
    },
    /// Change a stored preference: theme, play-mode, quality or volume.
    Set { key: Setting, value: String },
}

#[derive(Debug, Subcommand)]
enum PlaylistCommand {
    List,
    Show { name: String },
    Create { name: String },
    Delete { name: String },
    /// Add a search result to a playlist.
    Add {
        name: String,
        #[command(flatten)]
        pick: Pick,
    },
    /// Remove a song by track id.
    Remove { name: String, id: String },
    /// Play a playlist from the start (or from `--at`).
    Play {
        name: String,
        #[arg(long, default_value_t = 1)]
        at: usize,
    },
}

/// A track chosen from search results.
#[derive(Debug, Args)]
struct Pick {
    #[arg(required = true)]
    keyword: Vec<String>,
    /// Provider name or `aggregate`.
    #[arg(short, long)]
    source: Option<SearchScope>,
    /// 1-based position in the results.
    #[arg(short = 'n', long, default_value_t = 1)]
    index: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load(cli.config.as_deref()).context("load config")?;
    let client = ApiClient::new(&cfg.api).context("init api client")?;
    let storage = Storage::open(&cfg.paths.data_dir.join(DB_FILE)).context("open storage")?;
    let default_scope = SearchScope::Provider(cfg.playback.default_provider);

    match cli.command {
        Command::Play { pick } => {
            let tracks = search(&client, &pick, default_scope).await?;
            let index = pick_index(&tracks, pick.index)?;
            play(&cfg, client, storage, tracks, index).await?;
        }
        Command::Search { keyword, source } => {
            let keyword = keyword.join(" ");
            let tracks = client
                .search(source.unwrap_or(default_scope), &keyword)
                .await
                .with_context(|| format!("search `{keyword}`"))?;
            print_tracks(&tracks);
        }
        Command::Resolve { id, provider } => {
            let resolver = QualityResolver::new(client.clone(), client.endpoints().clone());
            let map = resolver.preload(provider, &id, &cfg.playback.tiers).await;
            for tier in &cfg.playback.tiers {
                match map.get(tier) {
                    Some(url) => println!("{:<18} {url}", tier.label()),
                    None => println!("{:<18} unavailable", tier.label()),
                }
            }
        }
        Command::Lyrics {
            id,
            provider,
            file,
            at,
        } => {
            let (lines, raw) = match (file, id, provider) {
                (Some(path), _, _) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("read {}", path.display()))?;
                    (lyrics::parser::parse_exported(&text), Some(text))
                }
                (None, Some(id), Some(provider)) => {
                    let info = client.info(provider, &id).await.context("fetch song info")?;
                    lyrics::fetch_lyrics(&client, &info).await
                }
                _ => anyhow::bail!("give a track id and --provider, or --file"),
            };
            match at {
                Some(time) => {
                    if let Some(i) = lyrics::active_index_at(time, &lines) {
                        println!("{}", lines[i].content);
                    }
                }
                None if lines.is_empty() => match raw {
                    Some(raw) => print!("{raw}"),
                    None => println!("no lyrics"),
                },
                None => {
                    for line in &lines {
                        println!("[{}] {}", app::format_time(line.time), line.content);
                    }
                }
            }
        }
        Command::Download {
            pick,
            kind,
            out,
            quality,
        } => {
            let tracks = search(&client, &pick, default_scope).await?;
            let track = &tracks[pick_index(&tracks, pick.index)?];
            let tier = match quality {
                Some(t) => t,
                None => read_quality(&storage),
            };
            let paths = save_track(&cfg, &client, track, tier, kind, &out).await?;
            for p in paths {
                println!("saved {}", p.display());
            }
        }
        Command::Playlist { cmd } => {
            playlist_command(cmd, &cfg, client, storage, default_scope).await?
        }
        Command::Stats => {
            let stats = storage.statistics()?;
            let summary = stats.summary(OffsetDateTime::now_utc().date());
            println!("total plays     {}", summary.total_plays);
            println!("today           {}", summary.today_plays);
            println!("minutes played  {}", summary.total_minutes);
            println!("favourites      {}", summary.favorites);
            println!();
            println!("you might like:");
            for r in stats.recommendations() {
                println!("  {} - {}    tunehub play {}", r.name, r.artist, r.keyword());
            }
        }
        Command::History => {
            for (i, entry) in storage.history()?.iter().enumerate() {
                println!(
                    "{:02}. {}  {} - {} [{}]",
                    i + 1,
                    entry.played_at,
                    entry.song.name,
                    entry.song.display_artist(),
                    entry.song.provider
                );
            }
        }
        Command::Export { out } => {
            let json = storage.export_json(OffsetDateTime::now_utc())?;
            write_output(out.as_deref(), &json)?;
        }
        Command::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let report = storage
                .import_json(&raw)
                .with_context(|| format!("import {}", file.display()))?;
            if let Some(n) = report.playlists {
                println!("imported {n} playlists");
            }
            if report.statistics {
                println!("imported play statistics");
            }
            if report.settings > 0 {
                println!("imported {} settings", report.settings);
            }
        }
        Command::Backup { out } => {
            let raw = storage.backup()?;
            write_output(out.as_deref(), &raw)?;
        }
        Command::ClearData { yes } => {
            anyhow::ensure!(yes, "this deletes every playlist and statistic; pass --yes");
            storage.clear_all()?;
            println!("playlists and statistics cleared");
        }
        Command::Set { key, value } => {
            let stored = key.normalize(&value)?;
            storage.set_setting(key, &stored)?;
            println!("{} = {stored}", key.key());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "tunehub=debug,warn" } else { "tunehub=info,warn" })
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

async fn playlist_command(
    cmd: PlaylistCommand,
    cfg: &config::Config,
    client: ApiClient,
    storage: Storage,
    default_scope: SearchScope,
) -> anyhow::Result<()> {
    match cmd {
        PlaylistCommand::List => {
            for (name, p) in storage.playlists()? {
                println!("{name}  ({} songs, created {})", p.songs.len(), p.created_at);
            }
        }
        PlaylistCommand::Show { name } => {
            let p = storage.playlist(&name)?;
            let tracks: Vec<Track> = p.songs.into_iter().map(|s| s.track).collect();
            print_tracks(&tracks);
        }
        PlaylistCommand::Create { name } => {
            storage.create_playlist(&name, OffsetDateTime::now_utc())?;
            println!("created {}", name.trim());
        }
        PlaylistCommand::Delete { name } => {
            storage.delete_playlist(&name)?;
            println!("deleted {name}");
        }
        PlaylistCommand::Add { name, pick } => {
            let tracks = search(&client, &pick, default_scope).await?;
            let track = &tracks[pick_index(&tracks, pick.index)?];
            storage.add_to_playlist(&name, track, OffsetDateTime::now_utc())?;
            println!("added {} - {} to {name}", track.name, track.display_artist());
        }
        PlaylistCommand::Remove { name, id } => {
            storage.remove_from_playlist(&name, &id)?;
            println!("removed {id} from {name}");
        }
        PlaylistCommand::Play { name, at } => {
            let p = storage.playlist(&name)?;
            let tracks: Vec<Track> = p.songs.into_iter().map(|s| s.track).collect();
            let index = pick_index(&tracks, at)?;
            play(cfg, client, storage, tracks, index).await?;
        }
    }
    Ok(())
}

async fn play(
    cfg: &config::Config,
    client: ApiClient,
    storage: Storage,
    tracks: Vec<Track>,
    index: usize,
) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(256);
    let mpv = player::MpvHandle::spawn(tx.clone(), cfg.player.audio_device.as_deref(), None)
        .await
        .context("start mpv")?;
    input::spawn_input_task(tx);

    println!("h for help, q to quit");
    let mut app = app::App::new(client, mpv, storage, cfg);
    app.start(tracks, index).await;
    app.run(rx).await
}

/// Resolve the audio (degrading when needed), lyrics and cover of `track`
/// and save the requested parts.
async fn save_track(
    cfg: &config::Config,
    client: &ApiClient,
    track: &Track,
    tier: QualityTier,
    kind: download::DownloadKind,
    dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let info = client
        .info(track.provider, &track.id)
        .await
        .with_context(|| format!("fetch info for {}", track.name))?;
    let (lines, raw) = lyrics::fetch_lyrics(client, &info).await;

    let resolver = QualityResolver::new(client.clone(), client.endpoints().clone());
    let empty = quality::ResolvedUrlMap::new();
    let audio = match resolver.probe_tier(tier, track.provider, &track.id, &empty).await {
        Ok(url) => Some((url, tier)),
        Err(e) => {
            tracing::warn!(%tier, error = %e, "requested quality unavailable");
            resolver
                .degrade(tier, &cfg.playback.tiers, track.provider, &track.id, &empty)
                .await
                .ok()
        }
    };

    let cover = info
        .pic
        .clone()
        .or_else(|| track.pic.clone())
        .unwrap_or_else(|| client.endpoints().cover(track.provider, &track.id));

    let src = download::DownloadSource {
        track,
        tier: audio.as_ref().map_or(tier, |(_, t)| *t),
        audio_url: audio.as_ref().map(|(url, _)| url.as_str()),
        lyrics: &lines,
        raw_lyrics: raw.as_deref(),
        cover_url: Some(&cover),
    };
    download::download(client, &src, kind, dir).await
}

async fn search(
    client: &ApiClient,
    pick: &Pick,
    default_scope: SearchScope,
) -> anyhow::Result<Vec<Track>> {
    let keyword = pick.keyword.join(" ");
    let tracks = client
        .search(pick.source.unwrap_or(default_scope), &keyword)
        .await
        .with_context(|| format!("search `{keyword}`"))?;
    anyhow::ensure!(!tracks.is_empty(), "no results for `{keyword}`");
    Ok(tracks)
}

/// Turn a 1-based position into an index into `tracks`.
fn pick_index(tracks: &[Track], position: usize) -> anyhow::Result<usize> {
    anyhow::ensure!(!tracks.is_empty(), "nothing to play");
    anyhow::ensure!(
        (1..=tracks.len()).contains(&position),
        "position {position} out of range 1..={}",
        tracks.len()
    );
    Ok(position - 1)
}

fn read_quality(storage: &Storage) -> QualityTier {
    storage
        .setting(Setting::PreferredQuality)
        .ok()
        .flatten()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

fn write_output(out: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}

fn print_tracks(tracks: &[Track]) {
    for (i, t) in tracks.iter().enumerate() {
        let album = if t.album.is_empty() {
            String::new()
        } else {
            format!(" · {}", t.album)
        };
        println!(
            "{:02}. {} - {}{}  ({} id={})",
            i + 1,
            t.name,
            t.display_artist(),
            album,
            t.provider,
            t.id
        );
    }
}
