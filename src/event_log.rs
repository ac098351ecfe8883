//! Append-only log of semantic events for the current viewer session.

use std::sync::{Arc, Mutex};

use chrono::TimeZone;
use serde::Serialize;

use crate::event::SemanticEvent;
use crate::format::{format_log_line, EMPTY_LOG_BANNER};
use crate::Result;

type OnAppendHandler = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// One recorded event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// `"{type}-{at_millis}-{index}"`, unique within one log
    pub id: String,
    #[serde(flatten)]
    pub event: SemanticEvent,
    /// Entered by hand from the debug controls rather than classified
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mocked: bool,
}

#[derive(Default)]
struct Inner {
    entries: Vec<LogEntry>,
    on_append: Option<OnAppendHandler>,
}

/// Shared, ordered event log. Clones refer to the same log.
#[derive(Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<Inner>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a classified event
    pub fn append(&self, event: SemanticEvent) -> LogEntry {
        self.push(event, false)
    }

    /// Append an event entered from the manual debug controls
    pub fn append_manual(&self, event: SemanticEvent) -> LogEntry {
        self.push(event, true)
    }

    fn push(&self, event: SemanticEvent, mocked: bool) -> LogEntry {
        let (entry, cb) = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let id = format!(
                "{}-{}-{}",
                event.kind().as_str(),
                event.at().timestamp_millis(),
                inner.entries.len()
            );
            let entry = LogEntry { id, event, mocked };
            inner.entries.push(entry.clone());
            (entry, inner.on_append.clone())
        };
        if let Some(cb) = cb {
            cb(&entry);
        }
        entry
    }

    /// Register a callback invoked after every append
    pub fn on_append<F>(&self, cb: F)
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.on_append = Some(Arc::new(cb));
    }

    /// Remove a previously registered append callback
    pub fn clear_on_append(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.on_append = None;
    }

    /// Entries in emission order
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pretty JSON array of all entries
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot()).map_err(|e| crate::Error::Other(e.to_string()))
    }

    /// Render the log as text lines in the given timezone; an empty log
    /// renders the waiting banner.
    pub fn render<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let entries = self.snapshot();
        if entries.is_empty() {
            return EMPTY_LOG_BANNER.to_string();
        }
        entries
            .iter()
            .map(|e| format_log_line(&e.event, tz))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(ms: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn entries_keep_order_and_get_indexed_ids() {
        let log = EventLog::new();
        log.append(SemanticEvent::Play {
            position_secs: 0.0,
            at: at(1000),
        });
        log.append(SemanticEvent::Seek {
            from_secs: 0.0,
            to_secs: 42.0,
            at: at(1200),
        });
        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "play-1000-0");
        assert_eq!(entries[1].id, "seek-1200-1");
        assert!(!entries[1].mocked);
    }

    #[test]
    fn clones_share_the_log_and_callbacks_fire() {
        let log = EventLog::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        log.on_append(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        let other = log.clone();
        other.append_manual(SemanticEvent::Pause {
            position_secs: 3.0,
            at: at(0),
        });
        assert_eq!(log.len(), 1);
        assert!(log.snapshot()[0].mocked);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        log.clear_on_append();
        log.append(SemanticEvent::Play {
            position_secs: 3.0,
            at: at(0),
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn json_export_flattens_events() {
        let log = EventLog::new();
        log.append_manual(SemanticEvent::Seek {
            from_secs: 5.0,
            to_secs: 15.0,
            at: at(0),
        });
        let v: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(v[0]["type"], "seek");
        assert_eq!(v[0]["from"], 5.0);
        assert_eq!(v[0]["mocked"], true);
        assert_eq!(v[0]["id"], "seek-0-0");
    }

    #[test]
    fn render_empty_and_populated() {
        let log = EventLog::new();
        assert!(log.render(&Utc).starts_with("Watching for interactions"));
        log.append(SemanticEvent::Pause {
            position_secs: 65.0,
            at: at(0),
        });
        assert_eq!(log.render(&Utc), "PAUSE 00:00:00 • at 1m 5s");
    }
}
