//! LRC format parser
//!
//! Parses synchronized lyrics in LRC format:
//! [mm:ss.xx] Lyrics line here
//!
//! Example:
//! [00:12.34] Hello world
//! [00:15.00] Another line
//!
//! The fractional part may use `.`, `,` or `:` and carries two digits
//! (hundredths) or three (thousandths).

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d+):(\d{2})(?:[.,:](\d{2,3}))?\](.*)").expect("valid LRC timestamp regex")
});

/// A single line of lyrics with its start time.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    /// Seconds from the start of the track
    pub time: f64,
    pub content: String,
}

impl LyricLine {
    pub fn new(time: f64, content: impl Into<String>) -> Self {
        Self {
            time,
            content: content.into(),
        }
    }
}

/// Parse LRC text into timed lines, in input order.
///
/// Lines without a timestamp and lines whose text is empty are dropped. The
/// result is not sorted; callers rely on the source being chronological.
pub fn parse(text: &str) -> Vec<LyricLine> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<LyricLine> {
    let cap = TIMESTAMP_RE.captures(line)?;
    let minutes: u64 = cap.get(1)?.as_str().parse().ok()?;
    let seconds: u64 = cap.get(2)?.as_str().parse().ok()?;
    let fraction = match cap.get(3) {
        Some(m) => {
            let digits = m.as_str();
            let divisor = if digits.len() == 2 { 100.0 } else { 1000.0 };
            digits.parse::<u64>().ok()? as f64 / divisor
        }
        None => 0.0,
    };

    let content = cap.get(4).map_or("", |m| m.as_str()).trim();
    if content.is_empty() {
        return None;
    }

    Some(LyricLine::new(
        (minutes * 60 + seconds) as f64 + fraction,
        content,
    ))
}

/// Render lines back to LRC, one `[mm:ss.xx]` header per entry followed by
/// its text and a blank separator line. Precision is hundredths.
pub fn serialize(lines: &[LyricLine]) -> String {
    let mut out = String::new();
    for line in lines {
        let centis = (line.time.max(0.0) * 100.0).round() as u64;
        let minutes = centis / 6000;
        let seconds = (centis % 6000) / 100;
        let hundredths = centis % 100;
        let _ = write!(
            out,
            "[{:02}:{:02}.{:02}]\n{}\n\n",
            minutes, seconds, hundredths, line.content
        );
    }
    out
}

/// Serialized entries put the text on the line after the timestamp.
/// Join each bare timestamp line with the text that follows it so the
/// result parses with [`parse`].
pub fn parse_exported(text: &str) -> Vec<LyricLine> {
    let mut joined = String::new();
    let mut pending: Option<&str> = None;
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(stamp) = pending.take() {
            if !trimmed.is_empty() && !TIMESTAMP_RE.is_match(trimmed) {
                let _ = writeln!(joined, "{stamp}{trimmed}");
                continue;
            }
            joined.push_str(stamp);
            joined.push('\n');
        }
        if is_bare_timestamp(trimmed) {
            pending = Some(trimmed);
        } else {
            joined.push_str(line);
            joined.push('\n');
        }
    }
    if let Some(stamp) = pending {
        joined.push_str(stamp);
    }
    parse(&joined)
}

fn is_bare_timestamp(line: &str) -> bool {
    TIMESTAMP_RE
        .captures(line)
        .and_then(|c| c.get(4))
        .is_some_and(|m| m.as_str().trim().is_empty())
        && line.starts_with('[')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_centis(t: f64) -> i64 {
        (t * 100.0).round() as i64
    }

    #[test]
    fn test_parse_basic() {
        let lines = parse("[00:01.50]Hello\n[00:03.00]World");
        assert_eq!(
            lines,
            vec![LyricLine::new(1.5, "Hello"), LyricLine::new(3.0, "World")]
        );
    }

    #[test]
    fn test_fraction_digit_count_sets_divisor() {
        let lines = parse("[00:12.34]a\n[00:12.340]b\n[01:02,005]c\n[00:07]d\n[00:08:50]e");
        assert_eq!(lines.len(), 5);
        assert!((lines[0].time - 12.34).abs() < 1e-9);
        assert!((lines[1].time - 12.34).abs() < 1e-9);
        assert!((lines[2].time - 62.005).abs() < 1e-9);
        assert_eq!(lines[3].time, 7.0);
        assert!((lines[4].time - 8.5).abs() < 1e-9);
    }

    #[test]
    fn test_drops_empty_and_untimed_lines() {
        let lrc = "[ti:Test Song]\n[ar:Someone]\n[00:01.00]   \nplain text\n[00:02.00]  kept  \n";
        let lines = parse(lrc);
        assert_eq!(lines, vec![LyricLine::new(2.0, "kept")]);
    }

    #[test]
    fn test_keeps_input_order() {
        let lines = parse("[00:05.00]late\n[00:01.00]early");
        assert_eq!(lines[0].content, "late");
        assert_eq!(lines[1].content, "early");
    }

    #[test]
    fn test_serialize_format() {
        let out = serialize(&[LyricLine::new(61.5, "Hi"), LyricLine::new(3.0, "There")]);
        assert_eq!(out, "[01:01.50]\nHi\n\n[00:03.00]\nThere\n\n");
    }

    #[test]
    fn test_serialize_rounds_thousandths() {
        let out = serialize(&[LyricLine::new(59.996, "edge")]);
        assert_eq!(out, "[01:00.00]\nedge\n\n");
    }

    #[test]
    fn test_round_trip_is_stable_at_hundredths() {
        let lrc = "[00:01.505]one\n[00:02,25]two\n[03:04.999]three\n[10:00]four";
        let first = parse(lrc);
        let second = parse_exported(&serialize(&first));

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(round_centis(a.time), round_centis(b.time));
            assert_eq!(a.content, b.content);
        }

        let third = parse_exported(&serialize(&second));
        assert_eq!(second, third);
    }
}
