//! Interaction event classifier.
//!
//! Players only report three coarse states plus an instantaneous position;
//! seeks are never reported directly. The classifier infers them by comparing
//! reported positions across state transitions:
//!
//! - BUFFERING with a large position jump is a confident, immediate seek.
//! - BUFFERING right after PAUSED with no visible jump is ambiguous (the
//!   widget's reported position can lag a scrubber click), so a *forced*
//!   verification re-reads the position a little later.
//! - PLAYING after PAUSED/BUFFERING schedules a forced verification against
//!   the position snapshotted before the pause, unless a seek was already
//!   signaled for this transition.
//!
//! The classifier does not own a timer. [`Classifier::on_notification`]
//! returns a [`VerificationTicket`] when a check should run; the driver waits
//! `ticket.delay`, reads the live position and hands both back to
//! [`Classifier::on_verification`]. Tickets carry a generation number, so a
//! ticket superseded by a newer notification or by [`Classifier::cancel`] is
//! simply ignored when it comes back.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::clock::Clock;
use crate::event::{Notification, PlayerState, SemanticEvent};
use crate::TrackerConfig;

/// Thresholds and timing for seek inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierSettings {
    /// How long to wait before re-reading the position
    pub verification_delay: Duration,
    /// A position delta above this is a seek
    pub seek_threshold_secs: f64,
    /// For forced checks, a delta above this is already a seek
    pub forced_seek_threshold_secs: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            verification_delay: Duration::from_millis(200),
            seek_threshold_secs: 0.5,
            forced_seek_threshold_secs: 0.1,
        }
    }
}

impl From<&TrackerConfig> for ClassifierSettings {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            verification_delay: Duration::from_millis(config.verification_delay_ms),
            seek_threshold_secs: config.seek_threshold_secs,
            forced_seek_threshold_secs: config.forced_seek_threshold_secs,
        }
    }
}

/// Handle for a scheduled verification check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationTicket {
    generation: u64,
    /// Delay the driver should wait before calling back
    pub delay: Duration,
}

/// The one outstanding verification, if any
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingVerification {
    pub ticket: VerificationTicket,
    /// Position the live reading is compared against
    pub reference_secs: f64,
    /// Forced checks also accept small deltas (scrubber clicks near the
    /// current position)
    pub forced: bool,
}

/// Everything the classifier remembers about one playback session.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierState {
    /// Best known true position, rounded to whole seconds
    pub last_known_position_secs: f64,
    /// `None` only before the first notification
    pub last_state: Option<PlayerState>,
    /// Snapshot of `last_known_position_secs` taken on entering PAUSED
    pub position_before_pause: Option<f64>,
    /// Suppresses a second seek report for the same physical seek
    pub seek_already_signaled: bool,
    pub pending_verification: Option<PendingVerification>,
    pub cancelled: bool,
    next_generation: u64,
}

impl Default for ClassifierState {
    fn default() -> Self {
        Self {
            last_known_position_secs: 0.0,
            last_state: None,
            position_before_pause: None,
            seek_already_signaled: false,
            pending_verification: None,
            cancelled: false,
            next_generation: 0,
        }
    }
}

/// Result of processing one notification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    /// Events to emit now, in order
    pub events: Vec<SemanticEvent>,
    /// Verification the driver must schedule, replacing any previous one
    pub verification: Option<VerificationTicket>,
}

impl ClassifierState {
    fn schedule(&mut self, reference_secs: f64, forced: bool, delay: Duration) -> VerificationTicket {
        self.next_generation += 1;
        let ticket = VerificationTicket {
            generation: self.next_generation,
            delay,
        };
        self.pending_verification = Some(PendingVerification {
            ticket,
            reference_secs,
            forced,
        });
        ticket
    }

    /// Apply one notification whose position has already been resolved and
    /// rounded. `now` stamps the emitted events.
    pub fn apply(
        &mut self,
        state: PlayerState,
        current: f64,
        settings: &ClassifierSettings,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Step {
        let mut step = Step::default();
        if self.cancelled {
            return step;
        }

        // Latest notification always wins over a stale check.
        self.pending_verification = None;

        match state {
            PlayerState::Playing => {
                let resuming = self.last_state.map(|s| s.is_halted()).unwrap_or(false);
                if !self.seek_already_signaled && resuming {
                    let reference = self.position_before_pause.unwrap_or(self.last_known_position_secs);
                    step.verification = Some(self.schedule(reference, true, settings.verification_delay));
                    self.seek_already_signaled = true;
                }
                self.last_known_position_secs = current;
                self.seek_already_signaled = false;
                self.position_before_pause = None;
                step.events.push(SemanticEvent::Play {
                    position_secs: current,
                    at: now,
                });
            }
            PlayerState::Paused => {
                self.position_before_pause = Some(self.last_known_position_secs);
                self.last_known_position_secs = current;
                step.events.push(SemanticEvent::Pause {
                    position_secs: current,
                    at: now,
                });
            }
            PlayerState::Buffering => {
                let from = self.last_known_position_secs;
                let delta = (current - from).abs();
                if delta > settings.seek_threshold_secs {
                    step.events.push(SemanticEvent::Seek {
                        from_secs: from,
                        to_secs: current,
                        at: now,
                    });
                    self.last_known_position_secs = current;
                    self.seek_already_signaled = true;
                    self.position_before_pause = None;
                } else if self.last_state == Some(PlayerState::Paused) {
                    // Possibly a scrubber click the reported position hasn't caught up with.
                    let reference = self.position_before_pause.unwrap_or(from);
                    step.verification = Some(self.schedule(reference, true, settings.verification_delay));
                    self.seek_already_signaled = true;
                } else if self.last_state.is_some() {
                    step.verification = Some(self.schedule(from, false, settings.verification_delay));
                } else {
                    self.last_known_position_secs = current;
                }
            }
            PlayerState::Unknown => {}
        }

        self.last_state = Some(state);
        step
    }

    /// Resolve a verification check against the live position (already
    /// resolved and rounded).
    pub fn verify(
        &mut self,
        ticket: VerificationTicket,
        live: f64,
        settings: &ClassifierSettings,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Option<SemanticEvent> {
        if self.cancelled {
            return None;
        }
        let pending = match self.pending_verification {
            Some(p) if p.ticket == ticket => p,
            _ => return None,
        };
        self.pending_verification = None;

        let delta = (live - pending.reference_secs).abs();
        let forced_hit = pending.forced
            && delta > settings.forced_seek_threshold_secs
            && pending.reference_secs >= 0.0;
        if delta > settings.seek_threshold_secs || forced_hit {
            self.last_known_position_secs = live;
            self.seek_already_signaled = true;
            Some(SemanticEvent::Seek {
                from_secs: pending.reference_secs,
                to_secs: live,
                at: now,
            })
        } else {
            None
        }
    }
}

/// One running classifier, bound to one playback session.
pub struct Classifier {
    state: ClassifierState,
    settings: ClassifierSettings,
    clock: Arc<dyn Clock>,
}

impl Classifier {
    pub fn new(settings: ClassifierSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: ClassifierState::default(),
            settings,
            clock,
        }
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled
    }

    pub fn pending_verification(&self) -> Option<&PendingVerification> {
        self.state.pending_verification.as_ref()
    }

    /// Process one player notification.
    pub fn on_notification(&mut self, n: &Notification) -> Step {
        if self.state.cancelled {
            debug!("classifier cancelled; ignoring {:?} notification", n.state);
            return Step::default();
        }
        if let Some(p) = self.state.pending_verification {
            debug!(
                "{:?} notification supersedes pending verification (reference={}s)",
                n.state, p.reference_secs
            );
        }
        let current = self.resolve_position(n.reported_position_secs);
        let step = self.state.apply(n.state, current, &self.settings, self.clock.now());
        debug!(
            "classified {:?}@{}s -> {} event(s), verification={}",
            n.state,
            current,
            step.events.len(),
            step.verification.is_some()
        );
        step
    }

    /// Complete a verification check. `live_position_secs` is the position
    /// read at fire time (`None` if the read failed). Stale or cancelled
    /// tickets yield nothing.
    pub fn on_verification(
        &mut self,
        ticket: VerificationTicket,
        live_position_secs: Option<f64>,
    ) -> Option<SemanticEvent> {
        if self.state.cancelled {
            debug!("dropping verification that fired after cancellation");
            return None;
        }
        let live = self.resolve_position(live_position_secs);
        let event = self.state.verify(ticket, live, &self.settings, self.clock.now());
        debug!("verification at {}s -> seek={}", live, event.is_some());
        event
    }

    /// Permanently stop emitting. Any outstanding ticket becomes a no-op.
    pub fn cancel(&mut self) {
        self.state.cancelled = true;
        self.state.pending_verification = None;
    }

    // Failed or nonsensical reads fall back to the last known position.
    fn resolve_position(&self, reported: Option<f64>) -> f64 {
        match reported {
            Some(p) if p.is_finite() => p.round(),
            _ => {
                warn!(
                    "player position unavailable; using last known {}s",
                    self.state.last_known_position_secs
                );
                self.state.last_known_position_secs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn classifier() -> Classifier {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        Classifier::new(ClassifierSettings::default(), Arc::new(clock))
    }

    fn note(state: PlayerState, pos: f64) -> Notification {
        Notification::new(state, Some(pos), Utc::now())
    }

    fn seek_of(ev: &SemanticEvent) -> Option<(f64, f64)> {
        match ev {
            SemanticEvent::Seek { from_secs, to_secs, .. } => Some((*from_secs, *to_secs)),
            _ => None,
        }
    }

    #[test]
    fn play_and_pause_emit_synchronously_once() {
        let mut c = classifier();
        let s = c.on_notification(&note(PlayerState::Playing, 3.0));
        assert_eq!(s.events.len(), 1);
        assert!(matches!(s.events[0], SemanticEvent::Play { position_secs, .. } if position_secs == 3.0));
        assert!(s.verification.is_none());

        let s = c.on_notification(&note(PlayerState::Paused, 3.0));
        assert_eq!(s.events.len(), 1);
        assert!(matches!(s.events[0], SemanticEvent::Pause { position_secs, .. } if position_secs == 3.0));
    }

    #[test]
    fn scrub_while_paused_is_reported_after_verification() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 0.0));
        c.on_notification(&note(PlayerState::Paused, 0.0));
        let s = c.on_notification(&note(PlayerState::Buffering, 0.0));
        assert!(s.events.is_empty(), "no seek before verification");
        let ticket = s.verification.expect("forced verification scheduled");
        assert!(c.pending_verification().unwrap().forced);

        let ev = c.on_verification(ticket, Some(42.0)).expect("seek");
        assert_eq!(seek_of(&ev), Some((0.0, 42.0)));
        assert_eq!(c.state().last_known_position_secs, 42.0);
        assert!(c.on_verification(ticket, Some(42.0)).is_none(), "ticket is single use");
    }

    #[test]
    fn large_jump_while_buffering_is_an_immediate_seek() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 0.0));
        let s = c.on_notification(&note(PlayerState::Buffering, 55.0));
        assert_eq!(s.events.len(), 1);
        assert_eq!(seek_of(&s.events[0]), Some((0.0, 55.0)));
        assert!(s.verification.is_none());
        assert!(c.state().seek_already_signaled);
        assert!(c.pending_verification().is_none());
    }

    #[test]
    fn first_notification_buffering_only_records_position() {
        let mut c = classifier();
        let s = c.on_notification(&note(PlayerState::Buffering, 10.0));
        assert!(s.events.is_empty());
        assert!(s.verification.is_none());
        assert_eq!(c.state().last_known_position_secs, 10.0);
        assert_eq!(c.state().last_state, Some(PlayerState::Buffering));
    }

    #[test]
    fn cancel_suppresses_scheduled_verification_and_later_notifications() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 0.0));
        c.on_notification(&note(PlayerState::Paused, 0.0));
        let ticket = c
            .on_notification(&note(PlayerState::Buffering, 0.0))
            .verification
            .unwrap();
        c.cancel();
        assert!(c.on_verification(ticket, Some(42.0)).is_none());
        let s = c.on_notification(&note(PlayerState::Playing, 42.0));
        assert!(s.events.is_empty());
        assert!(s.verification.is_none());
    }

    #[test]
    fn newer_notification_invalidates_pending_ticket() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 10.0));
        let first = c
            .on_notification(&note(PlayerState::Buffering, 10.0))
            .verification
            .unwrap();
        c.on_notification(&note(PlayerState::Paused, 10.0));
        assert!(c.pending_verification().is_none());
        assert!(c.on_verification(first, Some(80.0)).is_none());
    }

    #[test]
    fn verified_seek_is_not_reported_again_on_resume() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 30.0));
        c.on_notification(&note(PlayerState::Paused, 30.0));
        let t = c
            .on_notification(&note(PlayerState::Buffering, 30.0))
            .verification
            .unwrap();
        let seek = c.on_verification(t, Some(90.0));
        assert_eq!(seek.as_ref().and_then(seek_of), Some((30.0, 90.0)));

        let s = c.on_notification(&note(PlayerState::Playing, 90.0));
        assert!(s.verification.is_none(), "no second check for the same seek");
        assert_eq!(s.events.len(), 1);
        assert!(!c.state().seek_already_signaled);
    }

    #[test]
    fn immediate_seek_is_not_reported_again_on_resume() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 5.0));
        c.on_notification(&note(PlayerState::Buffering, 120.0));
        let s = c.on_notification(&note(PlayerState::Playing, 120.0));
        assert!(s.verification.is_none());
        assert_eq!(s.events.iter().filter_map(seek_of).count(), 0);
    }

    #[test]
    fn resume_from_pause_checks_against_pre_pause_position() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 30.0));
        c.on_notification(&note(PlayerState::Paused, 30.0));
        assert_eq!(c.state().position_before_pause, Some(30.0));

        let s = c.on_notification(&note(PlayerState::Playing, 90.0));
        assert!(matches!(s.events[0], SemanticEvent::Play { position_secs, .. } if position_secs == 90.0));
        let t = s.verification.expect("forced check on resume");
        let p = c.pending_verification().unwrap();
        assert_eq!(p.reference_secs, 30.0);
        assert!(p.forced);
        assert_eq!(c.state().position_before_pause, None);

        let ev = c.on_verification(t, Some(90.0)).unwrap();
        assert_eq!(seek_of(&ev), Some((30.0, 90.0)));
    }

    #[test]
    fn plain_resume_at_same_position_emits_no_seek() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 30.0));
        c.on_notification(&note(PlayerState::Paused, 30.0));
        let t = c
            .on_notification(&note(PlayerState::Playing, 30.0))
            .verification
            .unwrap();
        assert!(c.on_verification(t, Some(30.2)).is_none());
    }

    // Known suppression window: BUFFERING after PAUSED marks the seek as
    // signaled before its verification resolves. If PLAYING arrives first it
    // cancels the check and does not schedule another, so the seek is lost.
    #[test]
    fn quick_resume_after_paused_buffering_suppresses_seek() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 30.0));
        c.on_notification(&note(PlayerState::Paused, 30.0));
        let t = c
            .on_notification(&note(PlayerState::Buffering, 30.0))
            .verification
            .unwrap();
        let s = c.on_notification(&note(PlayerState::Playing, 90.0));
        assert!(s.verification.is_none());
        assert_eq!(s.events.len(), 1);
        assert!(c.on_verification(t, Some(90.0)).is_none());
    }

    #[test]
    fn non_forced_check_needs_a_real_jump() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 10.0));
        let t = c
            .on_notification(&note(PlayerState::Buffering, 10.0))
            .verification
            .unwrap();
        assert!(!c.pending_verification().unwrap().forced);
        assert!(!c.state().seek_already_signaled);
        assert!(c.on_verification(t, Some(10.4)).is_none());

        let t = c
            .on_notification(&note(PlayerState::Buffering, 10.0))
            .verification
            .unwrap();
        let ev = c.on_verification(t, Some(11.0)).unwrap();
        assert_eq!(seek_of(&ev), Some((10.0, 11.0)));
    }

    #[test]
    fn positions_are_rounded_before_comparison() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 10.4));
        assert_eq!(c.state().last_known_position_secs, 10.0);
        let s = c.on_notification(&note(PlayerState::Buffering, 10.6));
        assert_eq!(s.events.iter().filter_map(seek_of).next(), Some((10.0, 11.0)));
    }

    #[test]
    fn failed_reads_fall_back_to_last_known_position() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 12.0));
        let s = c.on_notification(&Notification::new(PlayerState::Paused, None, Utc::now()));
        assert!(matches!(s.events[0], SemanticEvent::Pause { position_secs, .. } if position_secs == 12.0));

        let s = c.on_notification(&Notification::new(PlayerState::Buffering, Some(f64::NAN), Utc::now()));
        assert!(s.events.is_empty());
        let t = s.verification.unwrap();
        assert!(c.on_verification(t, None).is_none());
    }

    #[test]
    fn unknown_state_updates_last_state_only() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 10.0));
        let s = c.on_notification(&note(PlayerState::Unknown, 99.0));
        assert!(s.events.is_empty());
        assert!(s.verification.is_none());
        assert_eq!(c.state().last_known_position_secs, 10.0);
        assert_eq!(c.state().last_state, Some(PlayerState::Unknown));

        let s = c.on_notification(&note(PlayerState::Playing, 12.0));
        assert!(s.verification.is_none(), "unknown is not a halted state");
    }

    #[test]
    fn unknown_state_still_cancels_pending_check() {
        let mut c = classifier();
        c.on_notification(&note(PlayerState::Playing, 10.0));
        let t = c
            .on_notification(&note(PlayerState::Buffering, 10.0))
            .verification
            .unwrap();
        c.on_notification(&note(PlayerState::Unknown, 10.0));
        assert!(c.on_verification(t, Some(70.0)).is_none());
    }

    #[test]
    fn events_are_stamped_with_clock_time() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let mut c = Classifier::new(ClassifierSettings::default(), clock.clone());
        c.on_notification(&note(PlayerState::Playing, 0.0));
        c.on_notification(&note(PlayerState::Paused, 0.0));
        let t = c
            .on_notification(&note(PlayerState::Buffering, 0.0))
            .verification
            .unwrap();
        clock.advance(chrono::Duration::milliseconds(200));
        let ev = c.on_verification(t, Some(42.0)).unwrap();
        assert_eq!(ev.at() - start, chrono::Duration::milliseconds(200));
    }
}
