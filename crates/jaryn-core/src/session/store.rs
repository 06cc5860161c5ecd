//! Durable session storage.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Session;
use crate::{Error, Result};

/// Persists the session across restarts.
///
/// Calls are short and synchronous; the gate invokes them outside any await.
pub trait SessionStore: Send + Sync {
    /// Loads the saved session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store exists but cannot be read.
    fn load(&self) -> Result<Option<Session>>;

    /// Saves the session, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    fn save(&self, session: &Session) -> Result<()>;

    /// Removes the saved session. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored session cannot be removed.
    fn clear(&self) -> Result<()>;
}

/// In-memory store for tests and ephemeral clients.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `session`.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.lock().clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock() = None;
        Ok(())
    }
}

/// Keyring entry name for the session token.
const SERVICE_NAME: &str = "jaryn";

/// Non-secret half of a persisted session.
#[derive(Debug, Serialize, Deserialize)]
struct Profile {
    #[serde(rename = "currentUser")]
    username: String,
    #[serde(rename = "isAuthenticated", default)]
    is_authenticated: bool,
}

/// System keyring store.
///
/// The bearer token lives in the platform secret store (Secret Service,
/// macOS Keychain or Windows Credential Manager). Only the username and the
/// authenticated flag go to a JSON profile file, written through a temporary
/// file that is renamed into place.
#[derive(Debug)]
pub struct KeyringSessionStore {
    entry: Entry,
    profile: PathBuf,
}

impl KeyringSessionStore {
    /// Creates a store keyed by `account` with its profile at `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Keyring`] if the keyring entry cannot be created.
    pub fn new(account: &str, profile: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            entry: Entry::new(SERVICE_NAME, &format!("session:{account}"))?,
            profile: profile.into(),
        })
    }

    /// Creates the default store, with its profile at `<data_dir>/jaryn/profile.json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the platform has no data directory, or
    /// [`Error::Keyring`] if the keyring entry cannot be created.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| Error::Config("no data directory on this platform".to_string()))?;
        Self::new("default", dir.join("jaryn").join("profile.json"))
    }

    /// File holding the non-secret profile.
    #[must_use]
    pub fn profile_path(&self) -> &Path {
        &self.profile
    }

    fn load_profile(&self) -> Result<Option<Profile>> {
        match std::fs::read_to_string(&self.profile) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl SessionStore for KeyringSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let Some(profile) = self.load_profile()? else {
            return Ok(None);
        };
        let token = match self.entry.get_password() {
            Ok(token) => token,
            Err(keyring::Error::NoEntry) => {
                debug!("Profile for {} has no token in the keyring", profile.username);
                return Ok(None);
            }
            Err(e) => {
                warn!("Failed to read session token: {}", e);
                return Err(e.into());
            }
        };
        debug!("Loaded session for {} from {:?}", profile.username, self.profile);
        Ok(Some(Session {
            token,
            username: profile.username,
            is_authenticated: profile.is_authenticated,
        }))
    }

    fn save(&self, session: &Session) -> Result<()> {
        self.entry.set_password(&session.token)?;
        if let Some(parent) = self.profile.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&Profile {
            username: session.username.clone(),
            is_authenticated: session.is_authenticated,
        })?;
        let tmp = self.profile.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.profile)?;
        debug!("Saved session for {}", session.username);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => {
                warn!("Failed to delete session token: {}", e);
                return Err(e.into());
            }
        }
        match std::fs::remove_file(&self.profile) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
