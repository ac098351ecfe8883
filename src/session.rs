//! Player session controller.
//!
//! A [`PlayerSession`] binds one [`Classifier`] to one player instance for
//! the lifetime of one video. It owns a small tokio task that drains the
//! player's signals, feeds state changes to the classifier, waits out
//! verification delays and appends every emitted event to the [`EventLog`].
//!
//! Ending the session (explicitly or by dropping it) cancels the classifier
//! before the player is destroyed, so nothing is appended afterwards, not
//! even by a verification that was already waiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::classifier::{Classifier, ClassifierSettings, ClassifierState, VerificationTicket};
use crate::clock::{Clock, SystemClock};
use crate::event::{Notification, PlayerState, SemanticEvent, StateCodes};
use crate::event_log::{EventLog, LogEntry};
use crate::player::{MountHandle, Player, PlayerEvents, PlayerFactory, PlayerSignal};
use crate::video_id::VideoId;
use crate::{Error, Result, TrackerConfig};

/// How far a manual "seek" entry jumps ahead
pub const MANUAL_SEEK_STEP_SECS: f64 = 10.0;

/// Entries the debug controls can add by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAction {
    Play,
    Pause,
    /// Seek forward by [`MANUAL_SEEK_STEP_SECS`]
    Seek,
}

/// State shared between the session handle and its event loop
struct Shared {
    classifier: Mutex<Classifier>,
    player: Arc<dyn Player>,
    codes: StateCodes,
    ready: AtomicBool,
    /// Position after the most recent logged entry, classified or manual
    last_position: Mutex<f64>,
    log: EventLog,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn record(&self, event: SemanticEvent, mocked: bool) -> LogEntry {
        let pos = event.resulting_position();
        let entry = if mocked {
            self.log.append_manual(event)
        } else {
            self.log.append(event)
        };
        if pos.is_finite() {
            *self.last_position.lock().unwrap_or_else(|e| e.into_inner()) = pos;
        }
        entry
    }

    fn handle_state_change(&self, code: i32) -> Option<(VerificationTicket, Instant)> {
        let state = PlayerState::from_code(code, &self.codes);
        let reported = self.player.current_position_secs();
        let n = Notification::new(state, reported, self.clock.now());

        let mut classifier = self.classifier.lock().unwrap_or_else(|e| e.into_inner());
        let step = classifier.on_notification(&n);
        // Appended under the lock so a concurrent `end` can't interleave.
        for event in step.events {
            self.record(event, false);
        }
        step.verification.map(|t| (t, Instant::now() + t.delay))
    }

    fn handle_verification(&self, ticket: VerificationTicket) {
        let live = self.player.current_position_secs();
        if live.is_none() {
            warn!("live position read failed during verification");
        }
        let mut classifier = self.classifier.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(event) = classifier.on_verification(ticket, live) {
            self.record(event, false);
        }
    }
}

/// One tracked playback session.
pub struct PlayerSession {
    video: VideoId,
    shared: Arc<Shared>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PlayerSession {
    /// Create the player and start tracking it. Must be called from within a
    /// tokio runtime.
    pub fn start(
        factory: &dyn PlayerFactory,
        mount: &MountHandle,
        video: VideoId,
        config: &TrackerConfig,
        log: EventLog,
    ) -> Result<Self> {
        Self::start_with_clock(factory, mount, video, config, log, Arc::new(SystemClock))
    }

    /// Like [`PlayerSession::start`], stamping events with the given clock.
    pub fn start_with_clock(
        factory: &dyn PlayerFactory,
        mount: &MountHandle,
        video: VideoId,
        config: &TrackerConfig,
        log: EventLog,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::InitializationError(format!("No tokio runtime available: {}", e)))?;

        let (events, signals) = PlayerEvents::channel();
        let player = factory.create(mount, &video, events)?;

        let classifier = Classifier::new(ClassifierSettings::from(config), clock.clone());
        let shared = Arc::new(Shared {
            classifier: Mutex::new(classifier),
            player,
            codes: config.state_codes,
            ready: AtomicBool::new(false),
            last_position: Mutex::new(0.0),
            log,
            clock,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = handle.spawn(run_loop(shared.clone(), signals, shutdown_rx));

        info!("tracking session started for {} at {}", video, mount);
        Ok(PlayerSession {
            video,
            shared,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video
    }

    /// Whether the player has signalled it finished initializing
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    /// Position after the most recent logged entry
    pub fn last_position(&self) -> f64 {
        *self.shared.last_position.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the classifier's memory
    pub fn classifier_state(&self) -> ClassifierState {
        self.shared
            .classifier
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state()
            .clone()
    }

    pub fn log(&self) -> &EventLog {
        &self.shared.log
    }

    /// Append a hand-entered entry (marked `mocked`) at the last logged
    /// position. A manual seek advances that position.
    pub fn log_manual(&self, action: ManualAction) -> LogEntry {
        let at = self.shared.clock.now();
        let pos = self.last_position();
        let event = match action {
            ManualAction::Play => SemanticEvent::Play { position_secs: pos, at },
            ManualAction::Pause => SemanticEvent::Pause { position_secs: pos, at },
            ManualAction::Seek => SemanticEvent::Seek {
                from_secs: pos,
                to_secs: pos + MANUAL_SEEK_STEP_SECS,
                at,
            },
        };
        self.shared.record(event, true)
    }

    /// Cancel tracking and destroy the player.
    pub fn end(mut self) {
        self.teardown();
    }

    /// End the session and wait for its event loop to exit.
    pub async fn end_and_wait(mut self) {
        self.teardown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn teardown(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            return;
        };
        self.shared
            .classifier
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
        let _ = shutdown.send(());
        self.shared.player.destroy();
        info!("tracking session for {} ended", self.video);
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    mut signals: UnboundedReceiver<PlayerSignal>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut pending: Option<(VerificationTicket, Instant)> = None;
    loop {
        let deadline = pending.map(|(_, d)| d).unwrap_or_else(Instant::now);
        tokio::select! {
            _ = &mut shutdown => break,
            signal = signals.recv() => match signal {
                Some(PlayerSignal::Ready) => {
                    debug!("player ready");
                    shared.ready.store(true, Ordering::SeqCst);
                }
                Some(PlayerSignal::StateChange(code)) => {
                    pending = shared.handle_state_change(code);
                }
                None => break,
            },
            _ = tokio::time::sleep_until(deadline), if pending.is_some() => {
                if let Some((ticket, _)) = pending.take() {
                    shared.handle_verification(ticket);
                }
            }
        }
    }
    debug!("session event loop exited");
}
