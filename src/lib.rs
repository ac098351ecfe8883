//! Streamtrack
//!
//! Records a semantic interaction log (play, pause, seek) for an embedded
//! video player that only reports coarse state changes.
//!
//! # Features
//!
//! - **Seek inference**: [`classifier::Classifier`] turns PLAYING / PAUSED /
//!   BUFFERING notifications into de-duplicated play, pause and seek events,
//!   with a debounced verification for seeks the player reports late
//! - **Session lifecycle**: [`session::PlayerSession`] binds one classifier to
//!   one player instance and tears both down deterministically
//! - **Log rendering**: [`format`] renders durations and log lines
//! - **HTTP bootstrap loader** (feature `http`, default): fetches the player's
//!   bootstrap script once per process
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamtrack::player::scripted::ScriptedPlayerFactory;
//! use streamtrack::{EventLog, PlayerSession, TrackerConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> streamtrack::Result<()> {
//! let config = TrackerConfig::default();
//! let factory = ScriptedPlayerFactory::new();
//! let log = EventLog::new();
//! let video = streamtrack::resolve_video_id("https://youtu.be/AJmaVPfyudQ").unwrap();
//!
//! let session = PlayerSession::start(&factory, &"player".into(), video, &config, log.clone())?;
//! // ... the player pushes state changes ...
//! session.end();
//! for entry in log.snapshot() {
//!     println!("{}", streamtrack::format::format_event_detail(&entry.event));
//! }
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;

pub mod error;
pub use error::{Error, Result};

pub mod app;
pub mod classifier;
pub mod clock;
pub mod event;
pub mod event_log;
pub mod format;
pub mod loader;
pub mod player;
pub mod scenario;
pub mod session;
pub mod video_id;

pub use classifier::{Classifier, ClassifierSettings};
pub use event::{EventKind, Notification, PlayerState, SemanticEvent, StateCodes};
pub use event_log::{EventLog, LogEntry};
pub use session::PlayerSession;
pub use video_id::{resolve_video_id, VideoId};

/// Default bootstrap script for the embedded player
pub const DEFAULT_BOOTSTRAP_URL: &str = "https://www.youtube.com/iframe_api";

/// Configuration for tracking sessions
///
/// The defaults reproduce the tracker's reference behaviour: a 200ms
/// verification window, 0.5s confident-seek threshold and 0.1s threshold for
/// forced checks. Missing fields in a JSON config file fall back to these.
///
/// # Examples
///
/// ```
/// let cfg = streamtrack::TrackerConfig::default();
/// assert_eq!(cfg.verification_delay_ms, 200);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Delay before a suspected seek is re-checked, in milliseconds
    pub verification_delay_ms: u64,
    /// Position delta (seconds) above which a change is a seek
    pub seek_threshold_secs: f64,
    /// Smaller delta accepted by forced checks (pause/resume around a scrub)
    pub forced_seek_threshold_secs: f64,
    /// URL of the player's bootstrap script
    pub bootstrap_url: String,
    /// Timeout for the bootstrap fetch in milliseconds
    pub bootstrap_timeout_ms: u64,
    /// Video shown when the viewer starts
    pub default_video_id: String,
    /// Raw state codes used by the player
    pub state_codes: StateCodes,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            verification_delay_ms: 200,
            seek_threshold_secs: 0.5,
            forced_seek_threshold_secs: 0.1,
            bootstrap_url: DEFAULT_BOOTSTRAP_URL.to_string(),
            bootstrap_timeout_ms: 30000,
            default_video_id: "AJmaVPfyudQ".to_string(),
            state_codes: StateCodes::default(),
        }
    }
}

impl TrackerConfig {
    /// Parse a (possibly partial) JSON configuration and validate it
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: TrackerConfig =
            serde_json::from_str(s).map_err(|e| Error::ConfigError(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject thresholds that would make the classifier meaningless
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("seek_threshold_secs", self.seek_threshold_secs),
            ("forced_seek_threshold_secs", self.forced_seek_threshold_secs),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::ConfigError(format!("{} must be a non-negative number, got {}", name, v)));
            }
        }
        if VideoId::parse(&self.default_video_id).is_none() {
            return Err(Error::ConfigError(format!(
                "default_video_id {:?} is not an 11-character identifier",
                self.default_video_id
            )));
        }
        let c = &self.state_codes;
        if c.playing == c.paused || c.playing == c.buffering || c.paused == c.buffering {
            return Err(Error::ConfigError("state codes must be distinct".into()));
        }
        Ok(())
    }
}
