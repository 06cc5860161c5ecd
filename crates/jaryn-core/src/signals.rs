//! Named, typed broadcast signals.
//!
//! Each [`Signal`] is a `tokio::sync::broadcast` channel with a name for
//! logging. Emitting with no subscribers is a no-op. A [`Subscription`] owns
//! its receiver, so dropping it unsubscribes.

use jaryn_push::PushEventKind;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::model::MessageId;

/// Per-signal buffer before slow subscribers start lagging.
const SIGNAL_CAPACITY: usize = 64;

/// A broadcast signal.
#[derive(Debug, Clone)]
pub struct Signal<T: Clone> {
    name: &'static str,
    sender: broadcast::Sender<T>,
}

impl<T: Clone> Signal<T> {
    /// Creates a signal.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { name, sender }
    }

    /// Publishes `value` to current subscribers. Returns how many received it.
    pub fn emit(&self, value: T) -> usize {
        // Err means there are no subscribers.
        let delivered = self.sender.send(value).unwrap_or(0);
        trace!("Signal {} emitted to {} subscriber(s)", self.name, delivered);
        delivered
    }

    /// Subscribes to values emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            name: self.name,
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Signal name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// A live subscription to a [`Signal`].
#[derive(Debug)]
pub struct Subscription<T: Clone> {
    name: &'static str,
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Waits for the next value; `None` once the signal is gone.
    ///
    /// A subscriber that falls behind skips the values it missed.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber of {} lagged, skipped {} value(s)", self.name, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(value) => return Some(value),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Subscriber of {} lagged, skipped {} value(s)", self.name, skipped);
                }
                Err(_) => return None,
            }
        }
    }

    /// Drains every pending value.
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Why the message list should reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// A push event concerning the user arrived.
    Push(PushEventKind),
    /// A local action changed the list (e.g. a drag-and-drop move).
    Local,
}

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user signed out.
    UserRequested,
    /// A REST call was rejected with 401.
    Unauthorized,
    /// The push stream was rejected with 401.
    PushUnauthorized,
    /// The server announced the token expired.
    TokenExpired,
}

/// Severity of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Action succeeded.
    Success,
    /// Action failed.
    Error,
    /// Neutral information.
    Info,
    /// Something needs attention.
    Warning,
}

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub kind: NotificationKind,
    /// Text.
    pub message: String,
}

impl Notification {
    /// Success notification.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    /// Error notification.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }

    /// Informational notification.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            message: message.into(),
        }
    }
}

/// Every signal the client core publishes.
#[derive(Debug, Clone)]
pub struct Signals {
    /// Reload the current message list.
    pub list_refresh: Signal<RefreshReason>,
    /// Reload the unread counter.
    pub unread_count: Signal<()>,
    /// A message was marked read.
    pub message_read: Signal<MessageId>,
    /// Clear the multi-selection.
    pub selection_clear: Signal<()>,
    /// The session ended.
    pub logout: Signal<LogoutReason>,
    /// User-visible notifications.
    pub notifications: Signal<Notification>,
}

impl Signals {
    /// Creates a fresh set of signals.
    #[must_use]
    pub fn new() -> Self {
        Self {
            list_refresh: Signal::new("list_refresh"),
            unread_count: Signal::new("unread_count"),
            message_read: Signal::new("message_read"),
            selection_clear: Signal::new("selection_clear"),
            logout: Signal::new("logout"),
            notifications: Signal::new("notifications"),
        }
    }

    /// Publishes an error notification.
    pub fn notify_error(&self, message: impl Into<String>) {
        self.notifications.emit(Notification::error(message));
    }

    /// Publishes a success notification.
    pub fn notify_success(&self, message: impl Into<String>) {
        self.notifications.emit(Notification::success(message));
    }
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}
