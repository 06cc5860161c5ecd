//! REST client for the mail backend.
//!
//! [`ApiClient`] attaches the session's bearer token to every request and
//! funnels every 401 into [`SessionGate::logout_if_current`], except on the
//! account endpoints where a 401 means the credentials were wrong. A 401 for
//! a token that a re-login has since replaced leaves the new session alone. Endpoint groups
//! live in submodules as further `impl ApiClient` blocks.

mod account;
mod attachments;
mod contacts;
mod email;
mod filters;
mod folders;

pub use attachments::DownloadedFile;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::session::SessionGate;
use crate::signals::LogoutReason;
use crate::{Error, Result};

/// Path fragments whose 401 is a credentials error rather than an expired
/// session.
const AUTH_PATHS: [&str; 3] = ["/login", "/register", "/verify"];

/// Returns true if a 401 from `path` must not end the session.
#[must_use]
pub fn is_auth_path(path: &str) -> bool {
    AUTH_PATHS.iter().any(|p| path.contains(p))
}

/// Error body returned by the backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Authenticated REST client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: Arc<SessionGate>,
}

impl ApiClient {
    /// Creates a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: Arc<ClientConfig>, session: Arc<SessionGate>) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_http(http, config, session))
    }

    /// Creates a client sharing an existing HTTP client.
    #[must_use]
    pub const fn with_http(
        http: reqwest::Client,
        config: Arc<ClientConfig>,
        session: Arc<SessionGate>,
    ) -> Self {
        Self {
            http,
            config,
            session,
        }
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session gate the client authenticates through.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionGate> {
        &self.session
    }

    /// Starts an authenticated request.
    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let token = self.session.require_token()?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Sends a request and maps failure statuses to errors.
    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.build()?;
        let sent_with = bearer_token(&request);
        let path = request.url().path().to_string();
        let method = request.method().clone();
        let response = self.http.execute(request).await?;
        let status = response.status();
        debug!("{} {} -> {}", method, path, status.as_u16());

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            if is_auth_path(&path) {
                return Err(Error::InvalidCredentials);
            }
            warn!("{} {} rejected with 401; ending session", method, path);
            if let Some(token) = sent_with {
                self.session.logout_if_current(&token, LogoutReason::Unauthorized);
            }
            return Err(Error::Unauthorized);
        }

        let message = response
            .text()
            .await
            .ok()
            .and_then(|body| serde_json::from_str::<ErrorBody>(&body).ok())
            .and_then(|body| body.error.or(body.message));
        warn!("{} {} failed with {}", method, path, status.as_u16());
        Err(Error::server(status.as_u16(), message))
    }

    /// Sends a request and decodes a JSON body.
    async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.config.endpoint(segments)?;
        self.execute_json(self.request(Method::GET, url)?.query(query))
            .await
    }

    /// Sends a bodiless request whose response body is ignored.
    async fn call(&self, method: Method, segments: &[&str], query: &[(&str, String)]) -> Result<()> {
        let url = self.config.endpoint(segments)?;
        self.execute(self.request(method, url)?.query(query))
            .await
            .map(drop)
    }

    async fn send_json<B, T>(&self, method: Method, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(segments)?;
        self.execute_json(self.request(method, url)?.json(body))
            .await
    }

    async fn send_json_unit<B>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: &B,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.config.endpoint(segments)?;
        self.execute(self.request(method, url)?.query(query).json(body))
            .await
            .map(drop)
    }
}

/// Token a built request carries in its `Authorization` header.
fn bearer_token(request: &reqwest::Request) -> Option<String> {
    request
        .headers()
        .get(reqwest::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(ToString::to_string)
}
