//! Session state and the authentication gate.
//!
//! [`SessionGate`] is the single owner of the signed-in session. The REST
//! client reads the bearer token from it, and both the REST client and the
//! push router route authentication failures into [`SessionGate::logout`].

mod gate;
mod store;

pub use gate::SessionGate;
pub use store::{KeyringSessionStore, MemorySessionStore, SessionStore};

use serde::{Deserialize, Serialize};

/// A signed-in session.
///
/// Field names match the persisted keys.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token.
    #[serde(rename = "authToken")]
    pub token: String,
    /// Username without the mail domain.
    #[serde(rename = "currentUser")]
    pub username: String,
    /// Set once login succeeded.
    #[serde(rename = "isAuthenticated", default)]
    pub is_authenticated: bool,
}

impl Session {
    /// Creates an authenticated session.
    #[must_use]
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
            is_authenticated: true,
        }
    }

    /// Returns true if the session can authenticate requests.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.is_authenticated && !self.token.is_empty() && !self.username.trim().is_empty()
    }
}

// The token never appears in logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("is_authenticated", &self.is_authenticated)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_keys() {
        let json = serde_json::to_value(Session::new("t0k", "alice")).unwrap();
        assert_eq!(json["authToken"], "t0k");
        assert_eq!(json["currentUser"], "alice");
        assert_eq!(json["isAuthenticated"], true);
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", Session::new("super-secret", "alice"));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("alice"));
    }

    #[test]
    fn test_is_usable() {
        assert!(Session::new("t", "alice").is_usable());
        assert!(!Session::new("", "alice").is_usable());
        let mut session = Session::new("t", "alice");
        session.is_authenticated = false;
        assert!(!session.is_usable());
    }
}
