pub mod actions;
pub mod events;

use crate::api::endpoints::Endpoints;
use crate::api::models::{Provider, QualityTier, SearchScope, SongInfo, Track};
use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::download::{self, ByteSource, DownloadKind, DownloadSource};
use crate::input;
use crate::lyrics::{self, LyricSource, LyricThrottle};
use crate::player::Player;
use crate::quality::fallback::{FallbackPolicy, TrackSearch};
use crate::quality::{Prober, QualityResolver, Recovery};
use crate::queue::{PlayMode, Queue};
use crate::session::PlaybackSession;
use crate::storage::{Setting, Storage};
use actions::Action;
use events::{Event, InputEvent, PlayerEvent};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::Instant;

const VOLUME_STEP: u8 = 10;
const DEFAULT_VOLUME: u8 = 80;
const SEEK_STEP_SECS: f64 = 10.0;

/// Everything the controller needs from the upstream service.
pub trait Backend: Prober + TrackSearch + LyricSource + ByteSource + Clone {
    fn info(
        &self,
        provider: Provider,
        id: &str,
    ) -> impl Future<Output = Result<SongInfo, ApiError>> + Send;
}

impl Backend for ApiClient {
    async fn info(&self, provider: Provider, id: &str) -> Result<SongInfo, ApiError> {
        ApiClient::info(self, provider, id).await
    }
}

/// Owns the playback session and reacts to input and player events.
pub struct App<B, P> {
    backend: B,
    resolver: QualityResolver<B>,
    policy: FallbackPolicy,
    tiers: Vec<QualityTier>,
    scope: SearchScope,
    download_dir: PathBuf,
    player: P,
    storage: Storage,
    queue: Queue,
    session: Option<PlaybackSession>,
    throttle: LyricThrottle,
    preferred: QualityTier,
    volume: u8,
    paused: bool,
    duration: f64,
    input_closed: bool,
    should_quit: bool,
    status: Option<String>,
}

impl<B: Backend, P: Player> App<B, P> {
    pub fn new(backend: B, player: P, storage: Storage, cfg: &Config) -> Self {
        let preferred = read_setting(&storage, Setting::PreferredQuality).unwrap_or_default();
        let mode: PlayMode = read_setting(&storage, Setting::PlayMode).unwrap_or_default();
        let volume = read_setting(&storage, Setting::PreferredVolume)
            .map(|v: u8| v.min(100))
            .unwrap_or(DEFAULT_VOLUME);

        let mut queue = Queue::new();
        queue.set_mode(mode);

        Self {
            resolver: QualityResolver::new(backend.clone(), Endpoints::new(&cfg.api.base_url)),
            backend,
            policy: FallbackPolicy::new(cfg.fallback.routes.clone()),
            tiers: cfg.playback.tiers.clone(),
            scope: SearchScope::Provider(cfg.playback.default_provider),
            download_dir: cfg.paths.download_dir.clone(),
            player,
            storage,
            queue,
            session: None,
            throttle: LyricThrottle::new(Duration::from_millis(cfg.playback.lyric_throttle_ms)),
            preferred,
            volume,
            paused: false,
            duration: 0.0,
            input_closed: false,
            should_quit: false,
            status: None,
        }
    }

    /// Queue `tracks` and start playing at `index`.
    pub async fn start(&mut self, tracks: Vec<Track>, index: usize) {
        self.queue.replace(tracks);
        self.queue.set_current(index);
        if let Err(e) = self.player.set_volume(self.volume).await {
            tracing::warn!(error = %e, "set initial volume failed");
        }
        match self.queue.current_track().cloned() {
            Some(track) => self.play_track(track).await,
            None => self.notify("nothing to play"),
        }
    }

    pub async fn run(&mut self, mut rx: mpsc::Receiver<Event>) -> anyhow::Result<()> {
        while !self.should_quit {
            let deadline = self.throttle.deadline();
            tokio::select! {
                ev = rx.recv() => match ev {
                    Some(ev) => self.handle_event(ev).await,
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_lyric_tick(Instant::now());
                }
            }
        }

        self.leave_track();
        if let Err(e) = self.player.stop().await {
            tracing::debug!(error = %e, "stop player");
        }
        Ok(())
    }

    async fn handle_event(&mut self, ev: Event) {
        match ev {
            Event::Input(InputEvent::Line(line)) => match input::parse_line(&line) {
                Ok(Some(action)) => self.handle_action(action).await,
                Ok(None) => {}
                Err(e) => self.notify(e.to_string()),
            },
            Event::Input(InputEvent::Closed) => {
                tracing::debug!("stdin closed, playing until the queue ends");
                self.input_closed = true;
            }
            Event::Player(pe) => self.handle_player(pe).await,
        }
    }

    async fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::Help => println!("{}", input::HELP),
            Action::Status => {
                let line = self.status_line();
                self.notify(line);
            }
            Action::TogglePause => {
                if let Err(e) = self.player.toggle_pause().await {
                    self.notify(format!("player error: {e:#}"));
                }
            }
            Action::VolumeUp => self.change_volume(self.volume.saturating_add(VOLUME_STEP)).await,
            Action::VolumeDown => self.change_volume(self.volume.saturating_sub(VOLUME_STEP)).await,
            Action::SeekForward => self.seek(SEEK_STEP_SECS).await,
            Action::SeekBack => self.seek(-SEEK_STEP_SECS).await,
            Action::PlayNext => match self.queue.advance().cloned() {
                Some(track) => self.play_track(track).await,
                None => self.notify("already at the last track"),
            },
            Action::PlayPrev => match self.queue.go_back().cloned() {
                Some(track) => self.play_track(track).await,
                None => self.notify("already at the first track"),
            },
            Action::SetQuality(tier) => self.change_quality(tier).await,
            Action::SetMode(mode) => {
                self.queue.set_mode(mode);
                self.save_setting(Setting::PlayMode, mode.as_str());
                self.notify(format!("play mode: {mode}"));
            }
            Action::AddToPlaylist(name) => {
                let Some(track) = self.current_track() else {
                    self.notify("nothing is playing");
                    return;
                };
                match self
                    .storage
                    .add_to_playlist(&name, &track, OffsetDateTime::now_utc())
                {
                    Ok(()) => self.notify(format!("added {} to {name}", track.name)),
                    Err(e) => self.notify(format!("{e:#}")),
                }
            }
            Action::Favorite => {
                let Some(track) = self.current_track() else {
                    self.notify("nothing is playing");
                    return;
                };
                match self.storage.mark_favorite(&track) {
                    Ok(_) => self.notify(format!("marked {} as favourite", track.name)),
                    Err(e) => self.notify(format!("{e:#}")),
                }
            }
            Action::Enqueue(keyword) => self.enqueue(&keyword).await,
            Action::ShowQueue => self.show_queue(),
            Action::Download(kind) => self.download(kind).await,
        }
    }

    async fn handle_player(&mut self, pe: PlayerEvent) {
        match pe {
            PlayerEvent::Started => self.paused = false,
            PlayerEvent::Paused => self.paused = true,
            PlayerEvent::Position { seconds } => {
                if let Some(s) = &mut self.session {
                    s.position = seconds;
                    if s.has_lyrics() {
                        self.throttle.observe(seconds, Instant::now());
                    }
                }
            }
            PlayerEvent::Duration { seconds } => self.duration = seconds,
            PlayerEvent::Ended => match self.queue.on_track_end().cloned() {
                Some(track) => self.play_track(track).await,
                None => {
                    self.leave_track();
                    self.session = None;
                    self.notify("end of queue");
                    if self.input_closed {
                        self.should_quit = true;
                    }
                }
            },
            PlayerEvent::LoadFailed(reason) => self.recover(reason).await,
            PlayerEvent::Warning(msg) => tracing::debug!(%msg, "player warning"),
        }
    }

    /// Load pipeline: info, lyrics, preload every tier, then play the
    /// preferred tier. Each call replaces the whole session.
    pub async fn play_track(&mut self, track: Track) {
        self.leave_track();
        self.throttle.clear();
        self.duration = 0.0;

        let info = match self.backend.info(track.provider, &track.id).await {
            Ok(info) => info,
            Err(e) => {
                self.session = None;
                self.notify(format!("cannot load {}: {e}", track.name));
                return;
            }
        };

        let mut session = PlaybackSession::new(track, self.preferred);
        let (lines, raw) = lyrics::fetch_lyrics(&self.backend, &info).await;
        session.lyrics = lines;
        session.raw_lyrics = raw;
        session.info = info;

        let (provider, id) = (session.track.provider, session.track.id.clone());
        session.urls = self.resolver.preload(provider, &id, &self.tiers).await;
        let url = self.resolver.resolve(session.tier, provider, &id, &session.urls);
        session.playing_url = Some(url.clone());

        let track = session.track.clone();
        let has_lyrics = session.has_lyrics();
        self.session = Some(session);

        self.notify(format!(
            "▶ {} - {} [{} {}]",
            track.name,
            track.display_artist(),
            track.provider,
            self.preferred
        ));
        if !has_lyrics {
            self.notify("no lyrics");
        }
        self.load_url(&url, None).await;
        self.record_play(&track);
    }

    /// A playback failure: try the remaining tiers, then another provider.
    async fn recover(&mut self, reason: String) {
        let Some(s) = &self.session else {
            tracing::debug!(%reason, "load failure with no session");
            return;
        };
        tracing::warn!(track = %s.track.name, tier = %s.tier, %reason, "playback failed");
        let (track, tier, urls, position) =
            (s.track.clone(), s.tier, s.urls.clone(), s.position);

        let outcome = self
            .resolver
            .recover(&track, tier, &self.tiers, &urls, &self.policy, &self.backend)
            .await;

        match outcome {
            Ok(Recovery::Degraded { url, tier: next }) => {
                if let Some(s) = &mut self.session {
                    s.tier = next;
                    s.playing_url = Some(url.clone());
                }
                self.notify(format!("{tier} unavailable, switched to {}", next.label()));
                self.load_url(&url, Some(position)).await;
            }
            Ok(Recovery::Substitute(substitute)) => {
                self.notify(format!(
                    "{} unavailable on {}, playing it from {}",
                    track.name,
                    track.provider.label(),
                    substitute.provider.label()
                ));
                self.queue.replace_current(substitute.clone());
                self.play_track(substitute).await;
            }
            Err(e) => {
                self.notify(e.to_string());
                self.leave_track();
                self.session = None;
            }
        }
    }

    /// Switch tier mid-track, resuming at the current position.
    async fn change_quality(&mut self, tier: QualityTier) {
        self.preferred = tier;
        self.save_setting(Setting::PreferredQuality, tier.as_str());

        let Some(s) = &self.session else {
            self.notify(format!("preferred quality: {}", tier.label()));
            return;
        };
        let (provider, id, urls, position, current) = (
            s.track.provider,
            s.track.id.clone(),
            s.urls.clone(),
            s.position,
            s.tier,
        );

        let switched = match self.resolver.probe_tier(tier, provider, &id, &urls).await {
            Ok(url) => Some((url, tier)),
            Err(e) => {
                tracing::warn!(%tier, error = %e, "requested quality unavailable");
                self.resolver
                    .degrade(tier, &self.tiers, provider, &id, &urls)
                    .await
                    .ok()
            }
        };

        match switched {
            Some((url, next)) => {
                if let Some(s) = &mut self.session {
                    s.tier = next;
                    s.playing_url = Some(url.clone());
                }
                self.notify(format!("quality: {}", next.label()));
                self.load_url(&url, Some(position)).await;
            }
            None => self.notify(format!("{} unavailable, keeping {}", tier.label(), current.label())),
        }
    }

    async fn enqueue(&mut self, keyword: &str) {
        let track = match self.backend.search(self.scope, keyword).await {
            Ok(results) => results.into_iter().next(),
            Err(e) => {
                self.notify(format!("search failed: {e}"));
                return;
            }
        };
        let Some(track) = track else {
            self.notify(format!("no results for `{keyword}`"));
            return;
        };

        self.notify(format!("queued {} - {}", track.name, track.display_artist()));
        self.queue.add(track.clone());
        if self.session.is_none() {
            self.queue.set_current(self.queue.len() - 1);
            self.play_track(track).await;
        }
    }

    fn show_queue(&self) {
        if self.queue.is_empty() {
            println!("queue is empty");
            return;
        }
        let current = self.queue.current_index();
        for (i, t) in self.queue.tracks().iter().enumerate() {
            let marker = if Some(i) == current { '>' } else { ' ' };
            println!("{marker} {:02}. {} - {}", i + 1, t.name, t.display_artist());
        }
    }

    async fn download(&mut self, kind: DownloadKind) {
        let result = match &self.session {
            Some(s) => {
                let src = DownloadSource {
                    track: &s.track,
                    tier: s.tier,
                    audio_url: s.playing_url.as_deref(),
                    lyrics: &s.lyrics,
                    raw_lyrics: s.raw_lyrics.as_deref(),
                    cover_url: s.info.pic.as_deref().or(s.track.pic.as_deref()),
                };
                download::download(&self.backend, &src, kind, &self.download_dir).await
            }
            None => {
                self.notify("nothing is playing");
                return;
            }
        };

        match result {
            Ok(paths) => {
                for p in paths {
                    self.notify(format!("saved {}", p.display()));
                }
            }
            Err(e) => self.notify(format!("download failed: {e:#}")),
        }
    }

    fn on_lyric_tick(&mut self, now: Instant) {
        let Some(time) = self.throttle.poll(now) else {
            return;
        };
        if let Some(line) = self.session.as_mut().and_then(|s| s.lyric_update(time)) {
            println!("  {}", line.content);
        }
    }

    async fn change_volume(&mut self, volume: u8) {
        let volume = volume.min(100);
        self.volume = volume;
        if let Err(e) = self.player.set_volume(volume).await {
            self.notify(format!("player error: {e:#}"));
            return;
        }
        self.save_setting(Setting::PreferredVolume, &volume.to_string());
        self.notify(format!("volume {volume}%"));
    }

    async fn seek(&mut self, seconds: f64) {
        if self.session.is_none() {
            return;
        }
        if let Err(e) = self.player.seek_relative(seconds).await {
            self.notify(format!("player error: {e:#}"));
        }
        if let Some(s) = &mut self.session {
            s.cursor.reset();
        }
    }

    async fn load_url(&mut self, url: &str, start: Option<f64>) {
        tracing::debug!(%url, ?start, "loading");
        if let Err(e) = self.player.load(url, start).await {
            self.notify(format!("player error: {e:#}"));
        }
    }

    fn record_play(&self, track: &Track) {
        let now = OffsetDateTime::now_utc();
        if let Err(e) = self.storage.record_play(track, now) {
            tracing::warn!(error = %e, "record play statistics");
        }
        if let Err(e) = self.storage.add_to_history(track, now) {
            tracing::warn!(error = %e, "add to history");
        }
    }

    /// Book the listened time of the current session.
    fn leave_track(&mut self) {
        if let Some(s) = &self.session {
            if let Err(e) = self.storage.add_play_time(&s.track, s.position) {
                tracing::warn!(error = %e, "record play time");
            }
        }
    }

    fn current_track(&self) -> Option<Track> {
        self.session.as_ref().map(|s| s.track.clone())
    }

    fn status_line(&self) -> String {
        let Some(s) = &self.session else {
            return match &self.status {
                Some(last) => format!("nothing is playing (last: {last})"),
                None => "nothing is playing".to_string(),
            };
        };
        format!(
            "{} - {} | {} | {} | {}/{} | mode {} | volume {}%{}",
            s.track.name,
            s.track.display_artist(),
            s.track.provider.label(),
            s.tier.label(),
            format_time(s.position),
            format_time(self.duration),
            self.queue.mode(),
            self.volume,
            if self.paused { " | paused" } else { "" }
        )
    }

    fn save_setting(&self, setting: Setting, value: &str) {
        if let Err(e) = self.storage.set_setting(setting, value) {
            tracing::warn!(key = setting.key(), error = %e, "save setting");
        }
    }

    fn notify(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        println!("{msg}");
        self.status = Some(msg);
    }
}

fn read_setting<T: std::str::FromStr>(storage: &Storage, setting: Setting) -> Option<T> {
    match storage.setting(setting) {
        Ok(v) => v.and_then(|v| v.parse().ok()),
        Err(e) => {
            tracing::warn!(key = setting.key(), error = %e, "read setting");
            None
        }
    }
}

pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::SearchScope;
    use crate::quality::tests::{BASE, make_track};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct BackendState {
        failing_probes: Vec<String>,
        failing_info: Vec<String>,
        search_results: Vec<Track>,
        searches: Vec<(SearchScope, String)>,
    }

    #[derive(Clone, Default)]
    struct FakeBackend(Arc<Mutex<BackendState>>);

    impl FakeBackend {
        fn failing_probes(patterns: &[&str]) -> Self {
            let b = Self::default();
            b.0.lock().unwrap().failing_probes = patterns.iter().map(|p| p.to_string()).collect();
            b
        }
    }

    impl Prober for FakeBackend {
        async fn probe(&self, url: &str) -> Result<String, ApiError> {
            let state = self.0.lock().unwrap();
            if state.failing_probes.iter().any(|p| url.contains(p.as_str())) {
                return Err(ApiError::Api {
                    code: 404,
                    message: "gone".into(),
                });
            }
            Ok(url.replace("/api/?", "/cdn/?"))
        }
    }

    impl TrackSearch for FakeBackend {
        async fn search(&self, scope: SearchScope, keyword: &str) -> Result<Vec<Track>, ApiError> {
            let mut state = self.0.lock().unwrap();
            state.searches.push((scope, keyword.to_string()));
            Ok(state.search_results.clone())
        }
    }

    impl LyricSource for FakeBackend {
        async fn fetch_text(&self, _url: &str) -> Result<String, ApiError> {
            Ok("[00:01.00]first\n[00:02.00]second".to_string())
        }
    }

    impl ByteSource for FakeBackend {
        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
            Ok(url.as_bytes().to_vec())
        }
    }

    impl Backend for FakeBackend {
        async fn info(&self, _provider: Provider, id: &str) -> Result<SongInfo, ApiError> {
            if self.0.lock().unwrap().failing_info.iter().any(|f| f == id) {
                return Err(ApiError::Api {
                    code: 404,
                    message: "song not found".into(),
                });
            }
            Ok(SongInfo {
                pic: None,
                lrc: Some("https://lyrics.test/1.lrc".into()),
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load(String, Option<f64>),
        Volume(u8),
        Other,
    }

    #[derive(Clone, Default)]
    struct FakePlayer(Arc<Mutex<Vec<Call>>>);

    impl FakePlayer {
        fn loads(&self) -> Vec<(String, Option<f64>)> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| match c {
                    Call::Load(url, start) => Some((url.clone(), *start)),
                    _ => None,
                })
                .collect()
        }
    }

    impl Player for FakePlayer {
        async fn load(&self, url: &str, start: Option<f64>) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(Call::Load(url.to_string(), start));
            Ok(())
        }
        async fn toggle_pause(&self) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(Call::Other);
            Ok(())
        }
        async fn seek_relative(&self, _seconds: f64) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(Call::Other);
            Ok(())
        }
        async fn set_volume(&self, volume: u8) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(Call::Volume(volume));
            Ok(())
        }
        async fn stop(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn app(backend: FakeBackend) -> (App<FakeBackend, FakePlayer>, FakePlayer) {
        let mut cfg = Config::default();
        cfg.api.base_url = BASE.to_string();
        let player = FakePlayer::default();
        let storage = Storage::open_in_memory().unwrap();
        (App::new(backend, player.clone(), storage, &cfg), player)
    }

    fn cdn(provider: &str, id: &str, tier: &str) -> String {
        format!("{BASE}/cdn/?source={provider}&id={id}&type=url&br={tier}")
    }

    #[tokio::test]
    async fn test_load_pipeline_plays_preloaded_preferred_tier() {
        let (mut app, player) = app(FakeBackend::default());
        app.start(vec![make_track("7", Provider::Netease)], 0).await;

        assert_eq!(player.loads(), vec![(cdn("netease", "7", "320k"), None)]);
        let s = app.session.as_ref().unwrap();
        assert_eq!(s.tier, QualityTier::High);
        assert_eq!(s.urls.len(), 4);
        assert_eq!(s.lyrics.len(), 2);

        assert_eq!(app.storage.statistics().unwrap().tracks["7"].count, 1);
        assert_eq!(app.storage.history().unwrap().len(), 1);
        assert!(player.0.lock().unwrap().contains(&Call::Volume(DEFAULT_VOLUME)));
    }

    #[tokio::test]
    async fn test_info_failure_is_reported_without_playing() {
        let backend = FakeBackend::default();
        backend.0.lock().unwrap().failing_info.push("7".into());
        let (mut app, player) = app(backend);

        app.start(vec![make_track("7", Provider::Netease)], 0).await;

        assert!(player.loads().is_empty());
        assert!(app.session.is_none());
        assert!(app.status.as_deref().unwrap().contains("song not found"));
        assert!(app.storage.statistics().unwrap().tracks.is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_degrades_and_resumes_position() {
        let (mut app, player) = app(FakeBackend::default());
        app.start(vec![make_track("7", Provider::Netease)], 0).await;
        app.handle_player(PlayerEvent::Position { seconds: 12.0 }).await;

        app.handle_player(PlayerEvent::LoadFailed("http 403".into())).await;

        let loads = player.loads();
        assert_eq!(loads.len(), 2);
        assert_eq!(loads[1], (cdn("netease", "7", "flac"), Some(12.0)));
        assert_eq!(app.session.as_ref().unwrap().tier, QualityTier::Lossless);
    }

    #[tokio::test]
    async fn test_dead_kuwo_track_is_replaced_from_qq() {
        let backend = FakeBackend::failing_probes(&["source=kuwo"]);
        let mut substitute = make_track("qq-3", Provider::Qq);
        substitute.name = "Sunny Day (Live)".into();
        backend.0.lock().unwrap().search_results = vec![substitute];
        let (mut app, player) = app(backend.clone());

        app.start(vec![make_track("kw-1", Provider::Kuwo)], 0).await;
        // nothing preloaded, so the on-demand endpoint is tried
        assert_eq!(
            player.loads()[0].0,
            format!("{BASE}/api/?source=kuwo&id=kw-1&type=url&br=320k")
        );

        app.handle_player(PlayerEvent::LoadFailed("404".into())).await;

        let loads = player.loads();
        assert_eq!(loads.last().unwrap(), &(cdn("qq", "qq-3", "320k"), None));
        let current = app.queue.current_track().unwrap();
        assert_eq!(current.id, "qq-3");
        assert_eq!(current.origin.as_ref().unwrap().id, "kw-1");
        assert_eq!(
            backend.0.lock().unwrap().searches,
            vec![(SearchScope::Provider(Provider::Qq), "Sunny Day Jay Chou".to_string())]
        );
    }

    #[tokio::test]
    async fn test_exhausted_recovery_stops() {
        let backend = FakeBackend::failing_probes(&["source=netease"]);
        let (mut app, player) = app(backend.clone());
        app.start(vec![make_track("7", Provider::Netease)], 0).await;

        app.handle_player(PlayerEvent::LoadFailed("404".into())).await;

        assert_eq!(player.loads().len(), 1);
        assert!(app.session.is_none());
        assert!(app.status.as_deref().unwrap().contains("no playable audio"));
        assert!(backend.0.lock().unwrap().searches.is_empty());
    }

    #[tokio::test]
    async fn test_quality_change_reloads_at_position() {
        let (mut app, player) = app(FakeBackend::default());
        app.start(vec![make_track("7", Provider::Netease)], 0).await;
        app.handle_player(PlayerEvent::Position { seconds: 42.0 }).await;

        app.handle_action(Action::SetQuality(QualityTier::HiRes)).await;

        assert_eq!(
            player.loads().last().unwrap(),
            &(cdn("netease", "7", "flac24bit"), Some(42.0))
        );
        assert_eq!(app.session.as_ref().unwrap().tier, QualityTier::HiRes);
        assert_eq!(
            app.storage.setting(Setting::PreferredQuality).unwrap().as_deref(),
            Some("flac24bit")
        );
    }

    #[tokio::test]
    async fn test_unavailable_quality_keeps_current_stream() {
        let backend = FakeBackend::failing_probes(&["br=flac24bit"]);
        let (mut app, player) = app(backend);
        app.start(vec![make_track("7", Provider::Netease)], 0).await;

        app.handle_action(Action::SetQuality(QualityTier::HiRes)).await;

        assert_eq!(player.loads().len(), 1);
        assert_eq!(app.session.as_ref().unwrap().tier, QualityTier::High);
        assert!(app.status.as_deref().unwrap().contains("keeping"));
    }

    #[tokio::test]
    async fn test_queue_end_books_play_time() {
        let (mut app, _player) = app(FakeBackend::default());
        app.start(vec![make_track("1", Provider::Qq), make_track("2", Provider::Qq)], 0)
            .await;
        app.handle_player(PlayerEvent::Position { seconds: 90.0 }).await;
        app.handle_player(PlayerEvent::Ended).await;
        assert_eq!(app.session.as_ref().unwrap().track.id, "2");

        app.handle_player(PlayerEvent::Position { seconds: 30.0 }).await;
        app.handle_event(Event::Input(InputEvent::Closed)).await;
        app.handle_player(PlayerEvent::Ended).await;

        assert!(app.session.is_none());
        assert!(app.should_quit);
        let stats = app.storage.statistics().unwrap();
        assert_eq!(stats.tracks["1"].total_play_time, 90.0);
        assert_eq!(stats.tracks["2"].total_play_time, 30.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lyric_updates_are_throttled() {
        let (mut app, _player) = app(FakeBackend::default());
        app.start(vec![make_track("1", Provider::Qq)], 0).await;

        let start = Instant::now();
        for t in [0.5, 1.1, 2.2] {
            app.handle_player(PlayerEvent::Position { seconds: t }).await;
        }
        app.on_lyric_tick(start);
        assert_eq!(app.session.as_ref().unwrap().cursor.current(), None);

        tokio::time::advance(Duration::from_millis(50)).await;
        app.on_lyric_tick(Instant::now());
        // only the latest time was evaluated
        assert_eq!(app.session.as_ref().unwrap().cursor.current(), Some(1));
        assert!(app.throttle.deadline().is_none());
    }

    #[tokio::test]
    async fn test_commands_update_settings_and_library() {
        let (mut app, _player) = app(FakeBackend::default());
        app.storage
            .create_playlist("mix", OffsetDateTime::now_utc())
            .unwrap();
        app.start(vec![make_track("1", Provider::Qq)], 0).await;

        for line in ["mode loop", "+", "add mix", "fav", "add nope"] {
            app.handle_event(Event::Input(InputEvent::Line(line.into())))
                .await;
        }

        assert_eq!(app.queue.mode(), PlayMode::Loop);
        assert_eq!(app.volume, 90);
        assert_eq!(app.storage.playlist("mix").unwrap().songs.len(), 1);
        assert_eq!(app.storage.statistics().unwrap().tracks["1"].favorite_count, 1);
        assert!(app.status.as_deref().unwrap().contains("nope"));
        assert_eq!(
            app.storage.setting(Setting::PlayMode).unwrap().as_deref(),
            Some("loop")
        );
    }

    #[tokio::test]
    async fn test_enqueue_starts_playback_when_idle() {
        let backend = FakeBackend::default();
        backend.0.lock().unwrap().search_results =
            vec![make_track("9", Provider::Netease), make_track("10", Provider::Netease)];
        let (mut app, player) = app(backend.clone());

        app.handle_action(Action::Enqueue("sunny day".into())).await;
        assert_eq!(app.queue.len(), 1);
        assert_eq!(app.session.as_ref().unwrap().track.id, "9");
        assert_eq!(player.loads().len(), 1);

        app.handle_action(Action::Enqueue("sunny day".into())).await;
        assert_eq!(app.queue.len(), 2);
        // already playing, so only queued
        assert_eq!(player.loads().len(), 1);
        assert_eq!(
            backend.0.lock().unwrap().searches[0],
            (SearchScope::Provider(Provider::Netease), "sunny day".to_string())
        );
    }

    #[tokio::test]
    async fn test_download_current_track() {
        let dir = std::env::temp_dir().join(format!("tunehub-app-dl-{}", std::process::id()));
        let (mut app, _player) = app(FakeBackend::default());
        app.download_dir = dir.clone();

        app.handle_action(Action::Download(DownloadKind::Song)).await;
        assert_eq!(app.status.as_deref(), Some("nothing is playing"));

        app.start(vec![make_track("7", Provider::Netease)], 0).await;
        app.handle_action(Action::Download(DownloadKind::Song)).await;

        let audio = std::fs::read_to_string(dir.join("Sunny_Day_Jay_Chou.mp3")).unwrap();
        assert_eq!(audio, cdn("netease", "7", "320k"));
        let lrc = std::fs::read_to_string(dir.join("Sunny_Day_Jay_Chou.lrc")).unwrap();
        assert!(lrc.starts_with("[00:01.00]\nfirst"));

        app.handle_action(Action::Download(DownloadKind::Cover)).await;
        assert!(app.status.as_deref().unwrap().contains("no cover"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(61.9), "1:01");
        assert_eq!(format_time(f64::NAN), "0:00");
    }
}
