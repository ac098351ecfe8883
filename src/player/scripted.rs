//! In-memory player driven by the caller, for tests and scenario replays.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;

use super::{MountHandle, Player, PlayerEvents, PlayerFactory};
use crate::event::{PlayerState, StateCodes};
use crate::video_id::VideoId;
use crate::{Error, Result};

/// A player whose position and state changes are set by hand.
pub struct ScriptedPlayer {
    video: VideoId,
    codes: StateCodes,
    events: PlayerEvents,
    position: Mutex<f64>,
    failing_reads: AtomicBool,
    destroyed: AtomicBool,
    reads: AtomicUsize,
}

impl ScriptedPlayer {
    pub fn new(video: VideoId, codes: StateCodes, events: PlayerEvents) -> Self {
        ScriptedPlayer {
            video,
            codes,
            events,
            position: Mutex::new(0.0),
            failing_reads: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn video(&self) -> &VideoId {
        &self.video
    }

    /// Move the playhead without telling anyone (a scrub the widget hasn't
    /// reported yet, or normal playback progress).
    pub fn set_position(&self, secs: f64) {
        let mut p = self.position.lock().unwrap_or_else(|e| e.into_inner());
        *p = secs;
    }

    /// Make position reads fail (or succeed again).
    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    /// Push a tracked state through the session's sink.
    pub fn emit(&self, state: PlayerState) -> bool {
        let code = match state {
            PlayerState::Playing => self.codes.playing,
            PlayerState::Paused => self.codes.paused,
            PlayerState::Buffering => self.codes.buffering,
            // ENDED in the widget's numbering; never one of the tracked codes
            PlayerState::Unknown => 0,
        };
        self.emit_code(code)
    }

    /// Push a raw state code.
    pub fn emit_code(&self, code: i32) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.events.state_change(code)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Number of position reads the session performed
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Player for ScriptedPlayer {
    fn current_position_secs(&self) -> Option<f64> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_reads.load(Ordering::SeqCst) {
            return None;
        }
        Some(*self.position.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            debug!("scripted player for {} destroyed", self.video);
        }
    }
}

/// Factory that hands out [`ScriptedPlayer`]s and remembers them so the
/// caller can drive them.
pub struct ScriptedPlayerFactory {
    codes: StateCodes,
    created: Mutex<Vec<Arc<ScriptedPlayer>>>,
    failure: Option<String>,
}

impl ScriptedPlayerFactory {
    pub fn new() -> Self {
        Self::with_codes(StateCodes::default())
    }

    pub fn with_codes(codes: StateCodes) -> Self {
        ScriptedPlayerFactory {
            codes,
            created: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    /// A factory whose `create` always fails with the given message
    pub fn failing(message: impl Into<String>) -> Self {
        ScriptedPlayerFactory {
            failure: Some(message.into()),
            ..Self::new()
        }
    }

    /// Most recently created player
    pub fn last(&self) -> Option<Arc<ScriptedPlayer>> {
        self.created.lock().unwrap_or_else(|e| e.into_inner()).last().cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for ScriptedPlayerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerFactory for ScriptedPlayerFactory {
    fn create(&self, mount: &MountHandle, video: &VideoId, events: PlayerEvents) -> Result<Arc<dyn Player>> {
        if let Some(msg) = &self.failure {
            return Err(Error::PlayerError(msg.clone()));
        }
        let player = Arc::new(ScriptedPlayer::new(video.clone(), self.codes, events.clone()));
        debug!("scripted player for {} mounted at {}", video, mount);
        self.created.lock().unwrap_or_else(|e| e.into_inner()).push(player.clone());
        events.ready();
        Ok(player)
    }

    fn requires_bootstrap(&self) -> bool {
        false
    }
}
