//! Video identifier resolution.
//!
//! Users paste anything from a bare identifier to a full watch/share/embed
//! link; [`resolve_video_id`] extracts the 11-character identifier when there
//! is one.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Length of a video identifier
pub const VIDEO_ID_LEN: usize = 11;

const EMBED_BASE: &str = "https://www.youtube.com/embed/";
const WATCH_BASE: &str = "https://www.youtube.com/watch";

/// A validated 11-character video identifier (`[A-Za-z0-9_-]{11}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl VideoId {
    /// Accepts exactly 11 valid characters, verbatim.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == VIDEO_ID_LEN && s.chars().all(is_id_char) {
            Some(VideoId(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Player embed URL with the JS API enabled and inline playback.
    pub fn embed_url(&self) -> Url {
        let mut u = Url::parse(EMBED_BASE).expect("static embed base is a valid URL");
        u.set_path(&format!("/embed/{}", self.0));
        u.query_pairs_mut()
            .append_pair("enablejsapi", "1")
            .append_pair("playsinline", "1")
            .append_pair("controls", "1");
        u
    }

    /// Canonical watch page URL, used to prefill the URL input.
    pub fn watch_url(&self) -> Url {
        let mut u = Url::parse(WATCH_BASE).expect("static watch base is a valid URL");
        u.query_pairs_mut().append_pair("v", &self.0);
        u
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VideoId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        VideoId::parse(&value).ok_or(crate::Error::InvalidVideoId(value))
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

// First 11 characters of `s`, if they are all identifier characters.
fn leading_id(s: &str) -> Option<VideoId> {
    let prefix: String = s.chars().take(VIDEO_ID_LEN).collect();
    VideoId::parse(&prefix)
}

fn parse_loose(input: &str) -> Option<Url> {
    Url::parse(input)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| Url::parse(&format!("https://{}", input)).ok())
}

fn is_youtube_host(host: &str) -> bool {
    host == "youtube.com" || host.ends_with(".youtube.com")
}

/// Extract a video identifier from user input.
///
/// Accepted forms (input is trimmed first):
/// - a bare identifier: `dQw4w9WgXcQ`
/// - `youtube.com/watch?v=ID` (also with `v` later in the query)
/// - `youtu.be/ID`
/// - `youtube.com/embed/ID`
///
/// Scheme and subdomain are optional.
pub fn resolve_video_id(input: &str) -> Option<VideoId> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(id) = VideoId::parse(trimmed) {
        return Some(id);
    }

    let url = parse_loose(trimmed)?;
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = url.path_segments()?;

    if host == "youtu.be" || host == "www.youtu.be" {
        return segments.next().and_then(leading_id);
    }
    if !is_youtube_host(&host) {
        return None;
    }
    match segments.next() {
        Some("watch") => url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .and_then(|(_, v)| leading_id(&v)),
        Some("embed") => segments.next().and_then(leading_id),
        _ => None,
    }
}
