//! Event router: push deliveries in, semantic signals out.
//!
//! The router owns the [`PushChannel`] and a pump task that drains its
//! deliveries. Each payload is parsed into a [`PushEvent`] and classified:
//! delivery kinds addressed to the signed-in user emit the list-refresh and
//! unread-count signals, a token-expiry event or a 401 on the stream ends the
//! session through [`SessionGate::logout`] and halts the push worker, so the
//! stale token is never presented again. Deliveries from any generation
//! other than the active one are dropped, so nothing queued before a
//! `stop`/`connect` cycle is routed twice.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jaryn_push::{
    ChannelMessage, Delivery, HaltHandle, HttpTransport, PushChannel, PushConfig, PushEvent,
    PushEventKind, Transport,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session::SessionGate;
use crate::signals::{LogoutReason, RefreshReason, Signals};

/// Generation value meaning "nothing is routed".
const INACTIVE: u64 = 0;

/// What a single push event means for this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    /// New or changed mail for the user: refresh list and unread count.
    Refresh(PushEventKind),
    /// The session must end.
    Logout(LogoutReason),
    /// Not relevant to the user.
    Ignore,
}

/// Classifies an event for the user at `address` (`None` when signed out).
#[must_use]
pub fn classify(event: &PushEvent, address: Option<&str>) -> RouteAction {
    match event.kind {
        PushEventKind::TokenExpired => RouteAction::Logout(LogoutReason::TokenExpired),
        kind if kind.is_delivery() => match address {
            Some(address) if event.is_addressed_to(address) => RouteAction::Refresh(kind),
            _ => RouteAction::Ignore,
        },
        _ => RouteAction::Ignore,
    }
}

/// Routes one channel message. Returns the action taken.
pub fn dispatch(message: &ChannelMessage, session: &SessionGate, signals: &Signals) -> RouteAction {
    match message {
        ChannelMessage::Event(payload) => {
            let event = match PushEvent::parse(payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping malformed push payload: {}", e);
                    return RouteAction::Ignore;
                }
            };

            let action = classify(&event, session.address().as_deref());
            match action {
                RouteAction::Refresh(kind) => {
                    debug!("Push {:?} for current user; refreshing", kind);
                    signals.list_refresh.emit(RefreshReason::Push(kind));
                    signals.unread_count.emit(());
                }
                RouteAction::Logout(reason) => {
                    session.logout(reason);
                }
                RouteAction::Ignore => debug!("Ignoring push {:?}", event.kind),
            }
            action
        }
        ChannelMessage::Unauthorized => {
            session.logout(LogoutReason::PushUnauthorized);
            RouteAction::Logout(LogoutReason::PushUnauthorized)
        }
        ChannelMessage::Error(e) => {
            debug!("Push channel reported: {}", e);
            RouteAction::Ignore
        }
    }
}

/// Routes push deliveries into [`Signals`].
pub struct EventRouter<T: Transport = HttpTransport> {
    channel: PushChannel<T>,
    pending: Option<mpsc::Receiver<Delivery>>,
    pump: Option<JoinHandle<()>>,
    active: Arc<AtomicU64>,
    session: Arc<SessionGate>,
    signals: Signals,
}

impl EventRouter<HttpTransport> {
    /// Creates a router over HTTP.
    #[must_use]
    pub fn http(config: PushConfig, session: Arc<SessionGate>, signals: Signals) -> Self {
        Self::new(HttpTransport::new(), config, session, signals)
    }
}

impl<T: Transport> EventRouter<T> {
    /// Creates a stopped router.
    #[must_use]
    pub fn new(transport: T, config: PushConfig, session: Arc<SessionGate>, signals: Signals) -> Self {
        let (channel, deliveries) = PushChannel::new(transport, config);
        Self {
            channel,
            pending: Some(deliveries),
            pump: None,
            active: Arc::new(AtomicU64::new(INACTIVE)),
            session,
            signals,
        }
    }

    /// Connects with the current session's token, replacing any previous
    /// connection. Returns the new generation.
    pub async fn connect(&mut self) -> u64 {
        if let Some(deliveries) = self.pending.take() {
            self.pump = Some(tokio::spawn(pump(
                deliveries,
                self.channel.halt_handle(),
                Arc::clone(&self.active),
                Arc::clone(&self.session),
                self.signals.clone(),
            )));
        }

        // Publish the generation before the worker can deliver under it.
        let next = self.channel.generation() + 1;
        self.active.store(next, Ordering::SeqCst);
        let generation = self.channel.connect(self.session.token()).await;
        debug_assert_eq!(generation, next);

        info!("Event router connected (generation {})", generation);
        generation
    }

    /// Stops routing and closes the connection. Returns false if nothing was
    /// connected.
    pub async fn stop(&mut self) -> bool {
        self.active.store(INACTIVE, Ordering::SeqCst);
        let stopped = self.channel.stop().await;
        if stopped {
            info!("Event router stopped");
        }
        stopped
    }

    /// Forces a list refresh after a local change.
    pub fn refresh_list(&self) {
        self.signals.list_refresh.emit(RefreshReason::Local);
    }

    /// Returns true while the push worker is alive. A logout halts it.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.channel.is_running()
    }

    /// Generation currently routed, or 0 when stopped.
    #[must_use]
    pub fn active_generation(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Signals this router publishes to.
    #[must_use]
    pub const fn signals(&self) -> &Signals {
        &self.signals
    }
}

impl<T: Transport> Drop for EventRouter<T> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

async fn pump(
    mut deliveries: mpsc::Receiver<Delivery>,
    halt: HaltHandle,
    active: Arc<AtomicU64>,
    session: Arc<SessionGate>,
    signals: Signals,
) {
    while let Some(delivery) = deliveries.recv().await {
        let current = active.load(Ordering::SeqCst);
        if delivery.generation != current {
            debug!(
                "Dropping delivery from generation {} (active {})",
                delivery.generation, current
            );
            continue;
        }

        if let RouteAction::Logout(reason) = dispatch(&delivery.message, &session, &signals) {
            // Nothing more is routed or read for this connection.
            let _ = active.compare_exchange(
                current,
                INACTIVE,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            halt.halt(current);
            info!("Event routing halted after {:?}", reason);
        }
    }
    debug!("Event router pump finished");
}
