//! User-facing notifications
//!
//! The capture core reports every terminal outcome (saved, failed,
//! rejected) as a notification. At most one error and one success are
//! live at any time; a new event of the same severity replaces the
//! prior one instead of queueing behind it. Events self-expire after a
//! fixed duration; the hosting UI decides presentation.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// How long a notification stays live before it dismisses itself.
pub const AUTO_DISMISS: Duration = Duration::from_secs(5);

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Success,
}

impl Severity {
    fn slot(self) -> usize {
        match self {
            Severity::Error => 0,
            Severity::Success => 1,
        }
    }
}

/// A single transient notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Monotonic sequence number, used to ignore stale dismiss timers
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub auto_dismiss_ms: u64,
}

/// Events emitted to notification subscribers
#[derive(Debug, Clone)]
pub enum NotifyEvent {
    Posted(Notification),
    Dismissed { id: u64, severity: Severity },
}

struct NotifierInner {
    seq: AtomicU64,
    live: Mutex<[Option<Notification>; 2]>,
    event_tx: broadcast::Sender<NotifyEvent>,
}

/// Publishes notifications and keeps the one-live-per-severity rule.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

impl Notifier {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(NotifierInner {
                seq: AtomicU64::new(0),
                live: Mutex::new([None, None]),
                event_tx,
            }),
        }
    }

    /// Subscribe to posted/dismissed events.
    pub fn subscribe(&self) -> broadcast::Receiver<NotifyEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn error(&self, message: impl Into<String>) {
        self.post(Severity::Error, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.post(Severity::Success, message);
    }

    /// Publish a notification, superseding the live one of the same
    /// severity, and arm its self-dismiss timer.
    pub fn post(&self, severity: Severity, message: impl Into<String>) {
        let id = self.inner.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let notification = Notification {
            id,
            message: message.into(),
            severity,
            auto_dismiss_ms: AUTO_DISMISS.as_millis() as u64,
        };

        tracing::debug!(?severity, id, "notification: {}", notification.message);

        {
            let mut live = self.inner.live.lock();
            live[severity.slot()] = Some(notification.clone());
        }
        let _ = self.inner.event_tx.send(NotifyEvent::Posted(notification));

        // The timer only clears the slot if no newer event took it over.
        // Outside a runtime (plain unit tests) the event simply never
        // self-expires.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let inner = self.inner.clone();
            handle.spawn(async move {
                tokio::time::sleep(AUTO_DISMISS).await;
                Notifier::dismiss_if_current(&inner, severity, id);
            });
        }
    }

    /// The currently live notification of the given severity, if any.
    pub fn current(&self, severity: Severity) -> Option<Notification> {
        self.inner.live.lock()[severity.slot()].clone()
    }

    /// Manually dismiss the live notification of the given severity.
    pub fn dismiss(&self, severity: Severity) {
        let dismissed = {
            let mut live = self.inner.live.lock();
            live[severity.slot()].take()
        };
        if let Some(n) = dismissed {
            let _ = self.inner.event_tx.send(NotifyEvent::Dismissed {
                id: n.id,
                severity,
            });
        }
    }

    fn dismiss_if_current(inner: &NotifierInner, severity: Severity, id: u64) {
        let dismissed = {
            let mut live = inner.live.lock();
            match live[severity.slot()] {
                Some(ref n) if n.id == id => live[severity.slot()].take(),
                _ => None,
            }
        };
        if let Some(n) = dismissed {
            let _ = inner.event_tx.send(NotifyEvent::Dismissed {
                id: n.id,
                severity,
            });
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
