use crate::api::models::QualityTier;
use crate::download::DownloadKind;
use crate::queue::PlayMode;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    Help,
    Status,
    TogglePause,
    VolumeUp,
    VolumeDown,
    SeekForward,
    SeekBack,
    PlayNext,
    PlayPrev,
    SetQuality(QualityTier),
    SetMode(PlayMode),
    AddToPlaylist(String),
    Favorite,
    /// Search and append the first hit to the queue.
    Enqueue(String),
    ShowQueue,
    Download(DownloadKind),
}
