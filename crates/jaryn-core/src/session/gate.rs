//! The session gate.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{info, warn};

use super::{Session, SessionStore};
use crate::signals::{LogoutReason, Signal};
use crate::{Error, Result};

/// Owner of the current session.
///
/// Logout is idempotent: however many failures race to end a session, it is
/// cleared once and the logout signal fires once.
pub struct SessionGate {
    current: Mutex<Option<Session>>,
    store: Arc<dyn SessionStore>,
    logout: Signal<LogoutReason>,
    mail_domain: String,
    changes: watch::Sender<Option<String>>,
}

impl SessionGate {
    /// Creates a gate, restoring any session the store holds.
    ///
    /// A store that cannot be read is treated as empty.
    pub fn new(
        store: Arc<dyn SessionStore>,
        logout: Signal<LogoutReason>,
        mail_domain: impl Into<String>,
    ) -> Self {
        let restored = match store.load() {
            Ok(session) => session.filter(Session::is_usable),
            Err(e) => {
                warn!("Could not restore session: {}", e);
                None
            }
        };
        if let Some(session) = &restored {
            info!("Restored session for {}", session.username);
        }

        let (changes, _) = watch::channel(restored.as_ref().map(|s| s.username.clone()));
        Self {
            current: Mutex::new(restored),
            store,
            logout,
            mail_domain: mail_domain.into(),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs a new session after login.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be persisted; the session is
    /// still active in memory.
    pub fn begin(&self, session: Session) -> Result<()> {
        let username = session.username.clone();
        let saved = self.store.save(&session);
        *self.lock() = Some(session);
        self.changes.send_replace(Some(username.clone()));
        info!("Signed in as {}", username);
        saved
    }

    /// Ends the session.
    ///
    /// Returns true if this call cleared a session; false if there was none,
    /// in which case nothing is emitted.
    pub fn logout(&self, reason: LogoutReason) -> bool {
        let previous = self.lock().take();
        self.end(previous, reason)
    }

    /// Ends the session only if it still holds `token`.
    ///
    /// A rejection of a request sent before a re-login must not end the newer
    /// session. Returns true if this call cleared a session.
    pub fn logout_if_current(&self, token: &str, reason: LogoutReason) -> bool {
        let previous = {
            let mut current = self.lock();
            if current.as_ref().is_some_and(|s| s.token == token) {
                current.take()
            } else {
                None
            }
        };
        if previous.is_none() {
            info!("Ignoring {:?} for a token that is no longer current", reason);
        }
        self.end(previous, reason)
    }

    fn end(&self, previous: Option<Session>, reason: LogoutReason) -> bool {
        let Some(previous) = previous else {
            return false;
        };

        if let Err(e) = self.store.clear() {
            warn!("Could not clear stored session: {}", e);
        }
        self.changes.send_replace(None);
        info!("Session for {} ended ({:?})", previous.username, reason);
        self.logout.emit(reason);
        true
    }

    /// Bearer token of the current session.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.token.clone())
    }

    /// Bearer token, or [`Error::NotAuthenticated`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] when signed out.
    pub fn require_token(&self) -> Result<String> {
        self.token().ok_or(Error::NotAuthenticated)
    }

    /// Username of the current session.
    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.username.clone())
    }

    /// Mail address of the current user.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        self.username()
            .map(|user| format!("{}@{}", user.trim(), self.mail_domain))
    }

    /// Returns true while a session is active.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock().as_ref().is_some_and(Session::is_usable)
    }

    /// Watches the signed-in username; `None` while signed out.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<String>> {
        self.changes.subscribe()
    }

    /// Mail domain used to build addresses.
    #[must_use]
    pub fn mail_domain(&self) -> &str {
        &self.mail_domain
    }
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("username", &self.username())
            .field("mail_domain", &self.mail_domain)
            .finish_non_exhaustive()
    }
}
