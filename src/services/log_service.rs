use crate::models::{ForwardEvent, ForwardLog, LogLevel};
use crate::services::observer::ForwardObserver;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Event log for one forwarding run.
///
/// Keeps the most recent entries in memory, mirrors every entry to
/// `tracing` and forwards the formatted line to the observer's log callback.
pub struct EventLog {
    run_id: Uuid,
    entries: Mutex<VecDeque<ForwardLog>>,
    max_entries: usize,
    observer: Option<Arc<dyn ForwardObserver>>,
}

impl EventLog {
    pub fn new(run_id: Uuid, max_entries: usize) -> Self {
        Self {
            run_id,
            entries: Mutex::new(VecDeque::with_capacity(max_entries.min(1024))),
            max_entries: max_entries.max(1),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ForwardObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn info(&self, event: ForwardEvent) {
        self.record(LogLevel::Info, event, None);
    }

    pub fn debug(&self, event: ForwardEvent) {
        self.record(LogLevel::Debug, event, None);
    }

    pub fn warn(&self, event: ForwardEvent, message: impl Into<String>) {
        self.record(LogLevel::Warning, event, Some(message.into()));
    }

    pub fn error(&self, event: ForwardEvent, message: impl Into<String>) {
        self.record(LogLevel::Error, event, Some(message.into()));
    }

    pub fn record(&self, level: LogLevel, event: ForwardEvent, message: Option<String>) {
        let mut entry = ForwardLog::new(self.run_id, level, event);
        if let Some(msg) = message {
            entry = entry.with_message(msg);
        }
        self.push(entry);
    }

    /// Record a pre-built entry
    pub fn push(&self, entry: ForwardLog) {
        let line = entry.format();

        match entry.level {
            LogLevel::Debug => tracing::debug!(run = %self.run_id, "{}", line),
            LogLevel::Info => tracing::info!(run = %self.run_id, "{}", line),
            LogLevel::Warning => tracing::warn!(run = %self.run_id, "{}", line),
            LogLevel::Error => tracing::error!(run = %self.run_id, "{}", line),
        }

        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= self.max_entries {
                entries.pop_front();
            }
            entries.push_back(entry);
        }

        if let Some(observer) = &self.observer {
            observer.log(&line);
        }
    }

    pub fn entries(&self) -> Vec<ForwardLog> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entries_by_level(&self, level: LogLevel) -> Vec<ForwardLog> {
        self.entries
            .lock()
            .map(|entries| entries.iter().filter(|e| e.level == level).cloned().collect())
            .unwrap_or_default()
    }

    /// Last `count` entries, oldest first
    pub fn recent(&self, count: usize) -> Vec<ForwardLog> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::observer::CallbackObserver;

    #[test]
    fn test_ring_drops_oldest() {
        let log = EventLog::new(Uuid::new_v4(), 3);
        for index in 0..5 {
            log.info(ForwardEvent::ChannelOpened { index });
        }

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].event, ForwardEvent::ChannelOpened { index: 2 });
        assert_eq!(entries[2].event, ForwardEvent::ChannelOpened { index: 4 });
    }

    #[test]
    fn test_filter_and_recent() {
        let log = EventLog::new(Uuid::new_v4(), 10);
        log.info(ForwardEvent::Connected);
        log.error(ForwardEvent::HandshakeFailed, "kex failed");
        log.debug(ForwardEvent::Handshake);

        let errors = log.entries_by_level(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message.as_deref(), Some("kex failed"));

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].event, ForwardEvent::Handshake);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_mirrors_to_observer() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let observer = CallbackObserver::trusting().on_log({
            let lines = lines.clone();
            move |line| lines.lock().unwrap().push(line.to_string())
        });

        let run_id = Uuid::new_v4();
        let log = EventLog::new(run_id, 10).with_observer(Arc::new(observer));
        log.warn(ForwardEvent::ListenFailed, "address in use");

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("WARN"));
        assert!(lines[0].contains("address in use"));
        assert_eq!(log.entries()[0].run_id, run_id);
    }
}
