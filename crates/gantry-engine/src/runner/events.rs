//! Callback-list event delivery for the run/session layer
//!
//! Registration lists are guarded by a lock; delivery happens outside
//! it, so handlers may re-enter the event source safely.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// One event kind's registered handlers
pub struct EventHandlers<T> {
    handlers: Mutex<Vec<Handler<T>>>,
}

impl<T> EventHandlers<T> {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&T) + Send + Sync + 'static) {
        self.handlers
            .lock()
            .expect("handler list poisoned")
            .push(Arc::new(handler));
    }

    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .lock()
            .expect("handler list poisoned")
            .clone();
        for handler in snapshot {
            handler(event);
        }
    }
}

impl<T> Default for EventHandlers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Severity of a run-level log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Error,
    Warning,
    Info,
}

/// A log message surfaced through a run's log event
#[derive(Debug, Clone)]
pub struct LogMessageEvent {
    pub severity: LogSeverity,
    pub message: String,
}

impl LogMessageEvent {
    pub fn new(severity: LogSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_receive_events() {
        let events: EventHandlers<u32> = EventHandlers::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let s = seen.clone();
        events.subscribe(move |n| {
            s.fetch_add(*n as usize, Ordering::SeqCst);
        });

        events.emit(&3);
        events.emit(&4);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn handlers_may_subscribe_reentrantly() {
        let events: Arc<EventHandlers<()>> = Arc::new(EventHandlers::new());
        let count = Arc::new(AtomicUsize::new(0));

        let inner_events = events.clone();
        let inner_count = count.clone();
        events.subscribe(move |_| {
            let c = inner_count.clone();
            // Delivery happens outside the lock, so this must not
            // deadlock.
            inner_events.subscribe(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            });
        });

        events.emit(&());
        events.emit(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
