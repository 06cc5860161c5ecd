//! Client configuration.

use std::time::Duration;

use jaryn_push::PushConfig;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Default REST base URL.
pub const DEFAULT_API_BASE: &str = "http://localhost:8080";

/// Default push stream URL.
pub const DEFAULT_PUSH_URL: &str = "http://localhost:8080/event-stream";

/// Domain appended to the username to form the user's address.
pub const DEFAULT_MAIL_DOMAIN: &str = "jaryn.com";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API, without a trailing slash.
    pub api_base: String,
    /// Push event stream URL.
    pub push_url: String,
    /// Mail domain of local users.
    pub mail_domain: String,
    /// Timeout applied to each REST request.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Delay between push reconnect attempts.
    #[serde(with = "duration_secs")]
    pub reconnect_delay: Duration,
    /// Listing page size.
    pub page_size: u32,
    /// Minimum time a transactional send takes before it completes.
    #[serde(with = "duration_secs")]
    pub min_send_duration: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            push_url: DEFAULT_PUSH_URL.to_string(),
            mail_domain: DEFAULT_MAIL_DOMAIN.to_string(),
            request_timeout: Duration::from_secs(10),
            reconnect_delay: jaryn_push::DEFAULT_RECONNECT_DELAY,
            page_size: 20,
            min_send_duration: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the client at another server, deriving the push URL from it.
    #[must_use]
    pub fn with_server(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.api_base = base.trim_end_matches('/').to_string();
        self.push_url = format!("{}/event-stream", self.api_base);
        self
    }

    /// Sets the push stream URL.
    #[must_use]
    pub fn with_push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = url.into();
        self
    }

    /// Sets the mail domain.
    #[must_use]
    pub fn with_mail_domain(mut self, domain: impl Into<String>) -> Self {
        self.mail_domain = domain.into();
        self
    }

    /// Sets the REST request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the push reconnect delay.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the listing page size.
    #[must_use]
    pub const fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the transactional send pacing.
    #[must_use]
    pub const fn with_min_send_duration(mut self, duration: Duration) -> Self {
        self.min_send_duration = duration;
        self
    }

    /// Checks the configuration for values the client cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("api_base", &self.api_base), ("push_url", &self.push_url)] {
            let url = Url::parse(value)
                .map_err(|e| Error::Config(format!("{name} is not a valid URL ({e}): {value}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!("{name} must be an http(s) URL: {value}")));
            }
        }
        if self.mail_domain.trim().is_empty() || self.mail_domain.contains('@') {
            return Err(Error::Config(format!(
                "invalid mail domain: {}",
                self.mail_domain
            )));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Builds an API URL from path segments; each segment is percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_base` is not a valid base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)?;
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("api_base cannot be a base: {}", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Address of `username` in the configured domain.
    #[must_use]
    pub fn address_of(&self, username: &str) -> String {
        format!("{}@{}", username.trim(), self.mail_domain)
    }

    /// Push channel settings derived from this configuration.
    #[must_use]
    pub fn push_config(&self) -> PushConfig {
        PushConfig::new(self.push_url.clone()).with_reconnect_delay(self.reconnect_delay)
    }
}

/// Serde helpers storing a `Duration` as fractional seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)] // Required by serde with= signature
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
