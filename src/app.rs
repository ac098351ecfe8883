//! Viewer application glue.
//!
//! Holds the pieces around a tracking session: the login gate, the current
//! video and the append-only event log. The player is only mounted while the
//! viewer is logged in. When the bootstrap script can't be loaded the viewer
//! falls back to a passive embed with no tracking.

use std::sync::Arc;

use log::{error, info};
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::event_log::{EventLog, LogEntry};
use crate::loader::BootstrapLoader;
use crate::player::{MountHandle, PlayerFactory};
use crate::session::{ManualAction, PlayerSession};
use crate::video_id::{resolve_video_id, VideoId};
use crate::{Error, Result, TrackerConfig};

pub const STATUS_LOGGED_IN: &str = "Viewer is authenticated. The livestream iframe is available.";
pub const STATUS_GUEST: &str = "Viewer is a guest. We block the player until they log in.";

/// What is currently shown in the player slot
pub enum PlayerMode {
    /// Guest view, nothing mounted
    Hidden,
    Tracking(PlayerSession),
    /// Plain embed without semantic tracking
    PassiveEmbed { embed_url: Url },
}

impl PlayerMode {
    pub fn is_tracking(&self) -> bool {
        matches!(self, PlayerMode::Tracking(_))
    }
}

pub struct ViewerApp<F: PlayerFactory> {
    config: TrackerConfig,
    factory: F,
    loader: Arc<BootstrapLoader>,
    mount: MountHandle,
    clock: Arc<dyn Clock>,
    logged_in: bool,
    video: VideoId,
    log: EventLog,
    mode: PlayerMode,
}

impl<F: PlayerFactory> ViewerApp<F> {
    /// A logged-out viewer showing the configured default video.
    pub fn new(config: TrackerConfig, factory: F, loader: Arc<BootstrapLoader>, mount: MountHandle) -> Result<Self> {
        Self::with_clock(config, factory, loader, mount, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: TrackerConfig,
        factory: F,
        loader: Arc<BootstrapLoader>,
        mount: MountHandle,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let video = VideoId::parse(&config.default_video_id)
            .ok_or_else(|| Error::InvalidVideoId(config.default_video_id.clone()))?;
        Ok(ViewerApp {
            config,
            factory,
            loader,
            mount,
            clock,
            logged_in: false,
            video,
            log: EventLog::new(),
            mode: PlayerMode::Hidden,
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn auth_label(&self) -> &'static str {
        if self.logged_in {
            "Logged in"
        } else {
            "Guest"
        }
    }

    pub fn status_text(&self) -> &'static str {
        if self.logged_in {
            STATUS_LOGGED_IN
        } else {
            STATUS_GUEST
        }
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video
    }

    pub fn mode(&self) -> &PlayerMode {
        &self.mode
    }

    pub fn session(&self) -> Option<&PlayerSession> {
        match &self.mode {
            PlayerMode::Tracking(s) => Some(s),
            _ => None,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Flip between guest and logged in. Logging out tears the player down.
    pub async fn toggle_login(&mut self) -> Result<()> {
        if self.logged_in {
            self.logged_in = false;
            self.unmount();
            info!("viewer logged out");
            Ok(())
        } else {
            self.logged_in = true;
            info!("viewer logged in");
            self.mount().await
        }
    }

    /// Apply user-entered text from the URL box. Returns whether the video
    /// changed; text resolving to the current video is a no-op.
    pub async fn set_video_input(&mut self, input: &str) -> Result<bool> {
        let video = resolve_video_id(input).ok_or_else(|| Error::InvalidVideoId(input.trim().to_string()))?;
        if video == self.video {
            return Ok(false);
        }
        info!("switching video {} -> {}", self.video, video);
        self.video = video;
        if self.logged_in {
            self.unmount();
            self.mount().await?;
        }
        Ok(true)
    }

    /// Add a hand-entered entry through the active session
    pub fn log_manual(&self, action: ManualAction) -> Option<LogEntry> {
        self.session().map(|s| s.log_manual(action))
    }

    fn unmount(&mut self) {
        // Replacing the mode drops (and so ends) any running session.
        self.mode = PlayerMode::Hidden;
    }

    async fn mount(&mut self) -> Result<()> {
        if self.factory.requires_bootstrap() {
            if let Err(e) = self.loader.load().await {
                error!("player bootstrap failed, falling back to a passive embed: {}", e);
                self.mode = PlayerMode::PassiveEmbed {
                    embed_url: self.video.embed_url(),
                };
                return Ok(());
            }
        }
        let session = PlayerSession::start_with_clock(
            &self.factory,
            &self.mount,
            self.video.clone(),
            &self.config,
            self.log.clone(),
            self.clock.clone(),
        )?;
        self.mode = PlayerMode::Tracking(session);
        Ok(())
    }
}
