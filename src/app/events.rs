#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Player(PlayerEvent),
}

#[derive(Debug, Clone)]
pub enum InputEvent {
    Line(String),
    /// stdin reached end of file
    Closed,
}

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Started,
    Paused,
    Position { seconds: f64 },
    Duration { seconds: f64 },
    /// The current file played to the end.
    Ended,
    /// The current file could not be opened or streamed.
    LoadFailed(String),
    /// Non-fatal diagnostics from the player.
    Warning(String),
}
