//! Scripted playback scenarios.
//!
//! A scenario is a JSON file describing what a viewer did to the player:
//!
//! ```json
//! {
//!   "video": "https://youtu.be/AJmaVPfyudQ",
//!   "steps": [
//!     { "after_ms": 0,   "state": "playing" },
//!     { "after_ms": 4000, "position": 4, "state": "paused" },
//!     { "after_ms": 500, "state": "buffering" },
//!     { "after_ms": 50,  "position": 95 },
//!     { "after_ms": 400, "state": "playing" }
//!   ]
//! }
//! ```
//!
//! Each step waits `after_ms`, then applies its fields in order: move the
//! playhead, toggle failing reads, emit a state (or raw `code`).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::clock::Clock;
use crate::event::PlayerState;
use crate::event_log::EventLog;
use crate::player::scripted::{ScriptedPlayer, ScriptedPlayerFactory};
use crate::session::PlayerSession;
use crate::video_id::{resolve_video_id, VideoId};
use crate::{Error, Result, TrackerConfig};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioStep {
    #[serde(default)]
    pub after_ms: u64,
    /// New playhead position, applied before any state change
    pub position: Option<f64>,
    pub state: Option<PlayerState>,
    /// Raw state code, for codes outside the tracked three
    pub code: Option<i32>,
    pub fail_reads: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Video id or any URL form the URL box accepts
    pub video: Option<String>,
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let scenario: Scenario = serde_json::from_str(s)?;
        for (i, step) in scenario.steps.iter().enumerate() {
            if step.state.is_some() && step.code.is_some() {
                return Err(Error::ScenarioError(format!(
                    "step {} sets both `state` and `code`",
                    i
                )));
            }
        }
        Ok(scenario)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// The video to play, falling back to the configured default.
    pub fn video_id(&self, config: &TrackerConfig) -> Result<VideoId> {
        let input = self.video.as_deref().unwrap_or(&config.default_video_id);
        resolve_video_id(input).ok_or_else(|| Error::InvalidVideoId(input.to_string()))
    }

    /// Drive a player through every step.
    pub async fn play(&self, player: &ScriptedPlayer) {
        for (i, step) in self.steps.iter().enumerate() {
            if step.after_ms > 0 {
                tokio::time::sleep(Duration::from_millis(step.after_ms)).await;
            }
            debug!("scenario step {}: {:?}", i, step);
            if let Some(p) = step.position {
                player.set_position(p);
            }
            if let Some(f) = step.fail_reads {
                player.set_failing_reads(f);
            }
            if let Some(state) = step.state {
                player.emit(state);
            } else if let Some(code) = step.code {
                player.emit_code(code);
            }
            // Let the session handle the signal before the next step.
            tokio::task::yield_now().await;
        }
    }

    /// Replay the scenario through a real session and return its log.
    ///
    /// After the last step the session is kept alive for twice the
    /// verification delay so a pending check can still land.
    pub async fn run(&self, config: &TrackerConfig, clock: Arc<dyn Clock>) -> Result<EventLog> {
        let video = self.video_id(config)?;
        let factory = ScriptedPlayerFactory::with_codes(config.state_codes);
        let log = EventLog::new();
        let session = PlayerSession::start_with_clock(
            &factory,
            &"scenario".into(),
            video,
            config,
            log.clone(),
            clock,
        )?;
        let player = factory
            .last()
            .ok_or_else(|| Error::PlayerError("scripted factory created no player".into()))?;

        self.play(&player).await;
        tokio::time::sleep(Duration::from_millis(config.verification_delay_ms * 2)).await;
        session.end_and_wait().await;
        Ok(log)
    }
}
