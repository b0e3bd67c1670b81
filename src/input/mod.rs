use crate::app::actions::Action;
use crate::app::events::{Event, InputEvent};
use crate::download::DownloadKind;
use clap::ValueEnum;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  p               pause / resume
  n / b           next / previous track
  + / -           volume up / down
  > / <           seek forward / back 10s
  quality <tier>  128k, 320k, flac, flac24bit
  mode <mode>     normal, single, loop, shuffle
  add <playlist>  add the current track to a playlist
  fav             mark the current track as favourite
  e <keyword>     search and append the first result to the queue
  l               list the queue
  dl [kind]       save the current track: audio, lyrics, cover, song, all
  i               show what is playing
  h               this help
  q               quit";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("unknown command `{0}` (h for help)")]
    Unknown(String),
    #[error("`{command}` needs an argument")]
    MissingArgument { command: &'static str },
    #[error("{0}")]
    Invalid(String),
}

/// Forward stdin lines to the controller until it hangs up.
pub fn spawn_input_task(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(Event::Input(InputEvent::Line(line))).await.is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => {
                    let _ = tx.send(Event::Input(InputEvent::Closed)).await;
                    break;
                }
            }
        }
    });
}

/// Map one typed line to an action. Blank lines map to nothing.
pub fn parse_line(line: &str) -> Result<Option<Action>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    let action = match cmd {
        "q" | "quit" => Action::Quit,
        "h" | "?" | "help" => Action::Help,
        "i" | "info" => Action::Status,
        "p" | "pause" => Action::TogglePause,
        "n" | "next" => Action::PlayNext,
        "b" | "prev" => Action::PlayPrev,
        "+" | "=" => Action::VolumeUp,
        "-" | "_" => Action::VolumeDown,
        ">" | "]" => Action::SeekForward,
        "<" | "[" => Action::SeekBack,
        "fav" => Action::Favorite,
        "quality" => {
            let tier = required(arg, "quality")?
                .parse()
                .map_err(|e: crate::api::models::UnknownVariant| InputError::Invalid(e.to_string()))?;
            Action::SetQuality(tier)
        }
        "mode" => {
            let mode = required(arg, "mode")?
                .parse()
                .map_err(|e: crate::api::models::UnknownVariant| InputError::Invalid(e.to_string()))?;
            Action::SetMode(mode)
        }
        "add" => Action::AddToPlaylist(required(arg, "add")?.to_string()),
        "e" | "enqueue" => Action::Enqueue(required(arg, "enqueue")?.to_string()),
        "l" | "queue" => Action::ShowQueue,
        "dl" | "download" => {
            let kind = if arg.is_empty() {
                DownloadKind::Song
            } else {
                DownloadKind::from_str(arg, true).map_err(InputError::Invalid)?
            };
            Action::Download(kind)
        }
        other => return Err(InputError::Unknown(other.to_string())),
    };
    Ok(Some(action))
}

fn required<'a>(arg: &'a str, command: &'static str) -> Result<&'a str, InputError> {
    if arg.is_empty() {
        Err(InputError::MissingArgument { command })
    } else {
        Ok(arg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::QualityTier;
    use crate::queue::PlayMode;

    #[test]
    fn test_single_key_commands() {
        assert_eq!(parse_line("p").unwrap(), Some(Action::TogglePause));
        assert_eq!(parse_line(" n ").unwrap(), Some(Action::PlayNext));
        assert_eq!(parse_line("+").unwrap(), Some(Action::VolumeUp));
        assert_eq!(parse_line("<").unwrap(), Some(Action::SeekBack));
        assert_eq!(parse_line("q").unwrap(), Some(Action::Quit));
        assert_eq!(parse_line("").unwrap(), None);
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(
            parse_line("quality flac").unwrap(),
            Some(Action::SetQuality(QualityTier::Lossless))
        );
        assert_eq!(
            parse_line("mode shuffle").unwrap(),
            Some(Action::SetMode(PlayMode::Shuffle))
        );
        assert_eq!(
            parse_line("add  late night  ").unwrap(),
            Some(Action::AddToPlaylist("late night".into()))
        );
        assert_eq!(
            parse_line("e jay chou").unwrap(),
            Some(Action::Enqueue("jay chou".into()))
        );
        assert_eq!(parse_line("dl").unwrap(), Some(Action::Download(DownloadKind::Song)));
        assert_eq!(
            parse_line("dl Cover").unwrap(),
            Some(Action::Download(DownloadKind::Cover))
        );
        assert!(matches!(parse_line("dl video"), Err(InputError::Invalid(_))));
    }

    #[test]
    fn test_bad_input() {
        assert_eq!(
            parse_line("quality").unwrap_err(),
            InputError::MissingArgument { command: "quality" }
        );
        assert!(matches!(parse_line("quality 999k"), Err(InputError::Invalid(_))));
        assert_eq!(parse_line("x").unwrap_err(), InputError::Unknown("x".into()));
    }
}
