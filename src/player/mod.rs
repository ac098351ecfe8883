//! Player capability surface.
//!
//! The tracker never talks to a concrete widget directly. A [`PlayerFactory`]
//! builds a [`Player`] for a mount point and video, handing it a
//! [`PlayerEvents`] sink through which the player pushes readiness and raw
//! state-change codes. The session reads positions back through the
//! [`Player`] trait.

pub mod scripted;

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::video_id::VideoId;
use crate::Result;

/// Opaque handle to where a player is mounted (element id, window name, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountHandle(String);

impl MountHandle {
    pub fn new(name: impl Into<String>) -> Self {
        MountHandle(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MountHandle {
    fn from(s: &str) -> Self {
        MountHandle::new(s)
    }
}

impl From<String> for MountHandle {
    fn from(s: String) -> Self {
        MountHandle(s)
    }
}

impl fmt::Display for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a player can push to its session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSignal {
    /// The player finished initializing
    Ready,
    /// Raw state code, normalized by the session's `StateCodes`
    StateChange(i32),
}

/// Notification sink handed to a player at construction. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PlayerEvents {
    tx: UnboundedSender<PlayerSignal>,
}

impl PlayerEvents {
    /// Create a sink and the receiver a session drains.
    pub fn channel() -> (Self, UnboundedReceiver<PlayerSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PlayerEvents { tx }, rx)
    }

    /// Returns `false` once the receiving session is gone.
    pub fn ready(&self) -> bool {
        self.tx.send(PlayerSignal::Ready).is_ok()
    }

    /// Returns `false` once the receiving session is gone.
    pub fn state_change(&self, code: i32) -> bool {
        self.tx.send(PlayerSignal::StateChange(code)).is_ok()
    }
}

/// A live player instance.
pub trait Player: Send + Sync {
    /// Best-effort current playback position in seconds. `None` when the
    /// underlying widget failed to answer.
    fn current_position_secs(&self) -> Option<f64>;

    /// Tear the widget down. Called once when its session ends.
    fn destroy(&self);
}

/// Builds players for a session.
pub trait PlayerFactory: Send + Sync {
    fn create(&self, mount: &MountHandle, video: &VideoId, events: PlayerEvents) -> Result<Arc<dyn Player>>;

    /// Whether the player bootstrap script must be loaded before `create`.
    /// Factories that don't depend on it (test doubles, native players) can
    /// opt out.
    fn requires_bootstrap(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_deliver_in_order_and_report_closed_sessions() {
        let (events, mut rx) = PlayerEvents::channel();
        assert!(events.ready());
        assert!(events.state_change(2));
        assert_eq!(rx.try_recv().unwrap(), PlayerSignal::Ready);
        assert_eq!(rx.try_recv().unwrap(), PlayerSignal::StateChange(2));
        drop(rx);
        assert!(!events.state_change(1));
    }

    #[test]
    fn mount_handle_conversions() {
        let m: MountHandle = "player-root".into();
        assert_eq!(m.as_str(), "player-root");
        assert_eq!(m.to_string(), "player-root");
    }
}
