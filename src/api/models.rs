use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Upstream music source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Netease,
    Kuwo,
    Qq,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Netease, Provider::Kuwo, Provider::Qq];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Netease => "netease",
            Provider::Kuwo => "kuwo",
            Provider::Qq => "qq",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Provider::Netease => "NetEase Cloud Music",
            Provider::Kuwo => "Kuwo Music",
            Provider::Qq => "QQ Music",
        }
    }

    /// Best-effort guess from a resource URL, defaulting to NetEase.
    pub fn guess_from_url(url: &str) -> Self {
        Provider::ALL
            .into_iter()
            .find(|p| url.contains(p.as_str()))
            .unwrap_or(Provider::Netease)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} `{value}` (expected one of: {expected})")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
    expected: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str, expected: &[&str]) -> Self {
        Self {
            kind,
            value: value.to_string(),
            expected: expected.join(", "),
        }
    }
}

impl FromStr for Provider {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "provider",
                value: s,
                expected: Provider::ALL.map(Provider::as_str).join(", "),
            })
    }
}

/// Audio quality tier. Declaration order is the fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "128k")]
    Standard,
    #[serde(rename = "320k")]
    #[default]
    High,
    #[serde(rename = "flac")]
    Lossless,
    #[serde(rename = "flac24bit")]
    HiRes,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [
        QualityTier::Standard,
        QualityTier::High,
        QualityTier::Lossless,
        QualityTier::HiRes,
    ];

    /// Wire name used for the `br` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Standard => "128k",
            QualityTier::High => "320k",
            QualityTier::Lossless => "flac",
            QualityTier::HiRes => "flac24bit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityTier::Standard => "Standard 128k",
            QualityTier::High => "High 320k",
            QualityTier::Lossless => "Lossless FLAC",
            QualityTier::HiRes => "Hi-Res FLAC 24bit",
        }
    }

    /// File extension for saved audio.
    pub fn extension(self) -> &'static str {
        match self {
            QualityTier::Standard | QualityTier::High => "mp3",
            QualityTier::Lossless | QualityTier::HiRes => "flac",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        QualityTier::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "quality",
                value: s,
                expected: QualityTier::ALL.map(QualityTier::as_str).join(", "),
            })
    }
}

/// What a search runs against: one provider or the aggregate endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Provider(Provider),
    Aggregate,
}

impl SearchScope {
    pub fn provider(self) -> Option<Provider> {
        match self {
            SearchScope::Provider(p) => Some(p),
            SearchScope::Aggregate => None,
        }
    }
}

impl FromStr for SearchScope {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggregate" | "aggregatesearch" | "all" => Ok(SearchScope::Aggregate),
            other => other.parse().map(SearchScope::Provider),
        }
    }
}

/// Where a substituted track originally came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackOrigin {
    pub provider: Provider,
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub artist: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub album: String,
    #[serde(rename = "platform")]
    pub provider: Provider,
    /// Lyric source URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lrc: Option<String>,
    /// Cover image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<TrackOrigin>,
}

impl Track {
    /// Build a track from one upstream search result.
    ///
    /// Ids may be numbers or strings and `artist` may be a list; results
    /// without an id are skipped. The provider comes from the item's own
    /// `platform`/`source` tag when present (aggregate searches), then from
    /// the searched `provider`, then from the item's `url`.
    pub fn from_value(v: &Value, provider: Option<Provider>) -> Option<Self> {
        let id = match v.get("id")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let name = v
            .get("name")
            .and_then(|x| x.as_str())
            .unwrap_or("Unknown title")
            .to_string();
        let artist = match v.get("artist") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|a| a.as_str().or_else(|| a.get("name").and_then(|n| n.as_str())))
                .collect::<Vec<_>>()
                .join(", "),
            _ => String::new(),
        };
        let album = v
            .get("album")
            .and_then(|x| x.as_str())
            .unwrap_or_default()
            .to_string();

        let tagged = ["platform", "source"]
            .iter()
            .filter_map(|k| v.get(*k).and_then(|x| x.as_str()))
            .find_map(|s| s.parse::<Provider>().ok());
        let from_url = v
            .get("url")
            .and_then(|x| x.as_str())
            .map(Provider::guess_from_url);
        let provider = tagged
            .or(provider)
            .or(from_url)
            .unwrap_or(Provider::Netease);

        let opt_str = |k: &str| {
            v.get(k)
                .and_then(|x| x.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            id,
            name,
            artist,
            album,
            provider,
            lrc: opt_str("lrc"),
            pic: opt_str("pic"),
            origin: None,
        })
    }

    pub fn display_artist(&self) -> &str {
        if self.artist.is_empty() {
            "Unknown artist"
        } else {
            &self.artist
        }
    }
}

/// Upstream ids are numbers for some providers and strings for others.
fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number id, got {other}"
        ))),
    }
}

/// A name, a list of names (joined with ", ") or null.
fn string_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|a| a.as_str().or_else(|| a.get("name").and_then(|n| n.as_str())))
            .collect::<Vec<_>>()
            .join(", ")),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or list, got {other}"
        ))),
    }
}

/// Payload of `type=info`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SongInfo {
    #[serde(default)]
    pub pic: Option<String>,
    #[serde(default)]
    pub lrc: Option<String>,
}

/// Common response envelope of the upstream API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub code: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub message: Option<String>,
}

/// Search results live either directly in `data` or under `data.results`.
pub fn tracks_from_search_data(data: &Value, provider: Option<Provider>) -> Vec<Track> {
    let items = data
        .get("results")
        .and_then(|r| r.as_array())
        .or_else(|| data.as_array());
    items
        .map(|arr| {
            arr.iter()
                .filter_map(|v| Track::from_value(v, provider))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_deserializes_loose_upstream_shapes() {
        let t: Track = serde_json::from_value(json!({
            "id": 186016,
            "name": "Sunny Day",
            "artist": ["Jay Chou", {"name": "Lara"}],
            "album": null,
            "platform": "netease",
            "url": "https://example.test/ignored"
        }))
        .unwrap();
        assert_eq!(t.id, "186016");
        assert_eq!(t.artist, "Jay Chou, Lara");
        assert_eq!(t.album, "");

        let origin: TrackOrigin =
            serde_json::from_value(json!({"provider": "kuwo", "id": 42, "name": "x"})).unwrap();
        assert_eq!(origin.id, "42");

        assert!(serde_json::from_value::<Track>(json!({
            "id": true, "name": "x", "platform": "qq"
        }))
        .is_err());
    }

    #[test]
    fn test_tier_order_and_names() {
        assert!(QualityTier::Standard < QualityTier::HiRes);
        assert_eq!("flac".parse::<QualityTier>().unwrap(), QualityTier::Lossless);
        assert_eq!(QualityTier::HiRes.to_string(), "flac24bit");
        assert!("999k".parse::<QualityTier>().is_err());
        assert_eq!(QualityTier::default(), QualityTier::High);
    }

    #[test]
    fn test_tier_serde_uses_wire_names() {
        let s = serde_json::to_string(&QualityTier::Standard).unwrap();
        assert_eq!(s, "\"128k\"");
    }

    #[test]
    fn test_track_from_search_item() {
        let v = json!({
            "id": 186016,
            "name": "Sunny Day",
            "artist": ["Jay Chou", "Someone"],
            "album": "Yehuimei",
            "url": "https://music.163.com/xyz"
        });
        let t = Track::from_value(&v, None).unwrap();
        assert_eq!(t.id, "186016");
        assert_eq!(t.artist, "Jay Chou, Someone");
        assert_eq!(t.provider, Provider::Netease);
        assert!(t.lrc.is_none());
    }

    #[test]
    fn test_item_platform_tag_wins() {
        let v = json!({"id": "abc", "name": "x", "platform": "kuwo"});
        let t = Track::from_value(&v, Some(Provider::Qq)).unwrap();
        assert_eq!(t.provider, Provider::Kuwo);
    }

    #[test]
    fn test_search_data_shapes() {
        let flat = json!([{"id": "1", "name": "a"}, {"name": "no id"}]);
        assert_eq!(tracks_from_search_data(&flat, Some(Provider::Qq)).len(), 1);

        let nested = json!({"results": [{"id": "1"}, {"id": "2"}]});
        let tracks = tracks_from_search_data(&nested, Some(Provider::Kuwo));
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].provider, Provider::Kuwo);
    }
}
