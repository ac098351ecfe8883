//! Input and output units of the interaction classifier.
//!
//! Players push coarse [`Notification`]s; the classifier turns them into
//! [`SemanticEvent`]s suitable for logging and display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse playback state as reported by the embedded player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Playing,
    Paused,
    Buffering,
    /// Any raw value that is not one of the three tracked states
    /// (unstarted, ended, cued, ...).
    Unknown,
}

impl PlayerState {
    /// Normalize a raw player code using the given mapping.
    pub fn from_code(code: i32, codes: &StateCodes) -> Self {
        if code == codes.playing {
            PlayerState::Playing
        } else if code == codes.paused {
            PlayerState::Paused
        } else if code == codes.buffering {
            PlayerState::Buffering
        } else {
            PlayerState::Unknown
        }
    }

    /// Whether playback is halted (a resume from here may straddle a seek).
    pub fn is_halted(&self) -> bool {
        matches!(self, PlayerState::Paused | PlayerState::Buffering)
    }
}

/// Raw integer codes the player uses for the tracked states.
///
/// The defaults match the widget's published constants; hosts that embed a
/// player with a different numbering can supply their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCodes {
    pub playing: i32,
    pub paused: i32,
    pub buffering: i32,
}

impl Default for StateCodes {
    fn default() -> Self {
        Self {
            playing: 1,
            paused: 2,
            buffering: 3,
        }
    }
}

/// A (state, reported position, receipt time) tuple pushed by the player.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub state: PlayerState,
    /// Position the player reported when the state changed. `None` when the
    /// read failed; the classifier substitutes its last known position.
    pub reported_position_secs: Option<f64>,
    pub received_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(state: PlayerState, reported_position_secs: Option<f64>, received_at: DateTime<Utc>) -> Self {
        Self {
            state,
            reported_position_secs,
            received_at,
        }
    }
}

/// Kind of a semantic event, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Play,
    Pause,
    Seek,
}

impl EventKind {
    /// Lowercase wire name (`play`, `pause`, `seek`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Play => "play",
            EventKind::Pause => "pause",
            EventKind::Seek => "seek",
        }
    }

    /// Uppercase label used in the rendered log.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Play => "PLAY",
            EventKind::Pause => "PAUSE",
            EventKind::Seek => "SEEK",
        }
    }
}

/// A classified interaction.
///
/// `at` is the wall-clock instant the event was emitted, not a playback
/// position. Play/pause positions that are not finite render as
/// "pending position".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SemanticEvent {
    Play {
        #[serde(rename = "position")]
        position_secs: f64,
        at: DateTime<Utc>,
    },
    Pause {
        #[serde(rename = "position")]
        position_secs: f64,
        at: DateTime<Utc>,
    },
    Seek {
        #[serde(rename = "from")]
        from_secs: f64,
        #[serde(rename = "to")]
        to_secs: f64,
        at: DateTime<Utc>,
    },
}

impl SemanticEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SemanticEvent::Play { .. } => EventKind::Play,
            SemanticEvent::Pause { .. } => EventKind::Pause,
            SemanticEvent::Seek { .. } => EventKind::Seek,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            SemanticEvent::Play { at, .. }
            | SemanticEvent::Pause { at, .. }
            | SemanticEvent::Seek { at, .. } => *at,
        }
    }

    /// Position the event leaves playback at: the play/pause position, or the
    /// seek target.
    pub fn resulting_position(&self) -> f64 {
        match self {
            SemanticEvent::Play { position_secs, .. } | SemanticEvent::Pause { position_secs, .. } => {
                *position_secs
            }
            SemanticEvent::Seek { to_secs, .. } => *to_secs,
        }
    }
}
