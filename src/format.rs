//! Human-readable rendering of durations, positions and log entries.
//!
//! All functions are pure. Positions are rounded to whole seconds and clamped
//! at zero before rendering.

use chrono::{DateTime, TimeZone};

use crate::event::SemanticEvent;

const SECS_PER_DAY: u64 = 86_400;

/// How [`format_duration`] lays out its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationStyle {
    /// With `show_days == false`, render a zero-padded `HH:MM:SS` clock
    pub compact: bool,
    /// Include a leading `Nd` component in the verbose form
    pub show_days: bool,
}

impl Default for DurationStyle {
    fn default() -> Self {
        Self {
            compact: false,
            show_days: true,
        }
    }
}

impl DurationStyle {
    /// The `HH:MM:SS` form (days are dropped, not folded into hours)
    pub const CLOCK: DurationStyle = DurationStyle {
        compact: true,
        show_days: false,
    };
}

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    }
}

/// Render a number of seconds, e.g. `"1d 1h 1m 1s"`, `"42s"` or `"01:01:01"`.
///
/// Zero components are omitted in the verbose form; seconds are shown when
/// everything else is zero.
pub fn format_duration(seconds: f64, style: DurationStyle) -> String {
    let total = whole_seconds(seconds);
    let days = total / SECS_PER_DAY;
    let hours = (total % SECS_PER_DAY) / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if style.compact && !style.show_days {
        return format!("{:02}:{:02}:{:02}", hours, minutes, secs);
    }

    let mut parts = Vec::with_capacity(4);
    if style.show_days && days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{}s", secs));
    }
    parts.join(" ")
}

/// Render the detail column of a log entry.
///
/// A seek whose endpoints fall in the same nonzero day bucket is rendered as
/// two `HH:MM:SS` clocks; every other seek renders each side verbosely.
pub fn format_event_detail(event: &SemanticEvent) -> String {
    match event {
        SemanticEvent::Seek { from_secs, to_secs, .. } => {
            let from_day = whole_seconds(*from_secs) / SECS_PER_DAY;
            let to_day = whole_seconds(*to_secs) / SECS_PER_DAY;
            let style = if from_day == to_day && from_day > 0 {
                DurationStyle::CLOCK
            } else {
                DurationStyle::default()
            };
            format!(
                "{} → {}",
                format_duration(*from_secs, style),
                format_duration(*to_secs, style)
            )
        }
        SemanticEvent::Play { position_secs, .. } | SemanticEvent::Pause { position_secs, .. } => {
            if position_secs.is_finite() {
                format!("at {}", format_duration(*position_secs, DurationStyle::default()))
            } else {
                "pending position".to_string()
            }
        }
    }
}

/// 24-hour `HH:MM:SS` wall clock in the instant's own timezone.
pub fn format_clock<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%H:%M:%S").to_string()
}

/// One rendered log line: `"SEEK 12:00:01 • 0s → 42s"`.
pub fn format_log_line<Tz: TimeZone>(event: &SemanticEvent, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} {} • {}",
        event.kind().label(),
        format_clock(&event.at().with_timezone(tz)),
        format_event_detail(event)
    )
}

/// Shown in place of the log while nothing has been recorded yet.
pub const EMPTY_LOG_BANNER: &str =
    "Watching for interactions\nPlay, pause, and seek actions will appear here.";
