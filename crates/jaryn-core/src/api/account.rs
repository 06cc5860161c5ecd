//! Account endpoints: login and registration.

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiClient;
use crate::session::Session;
use crate::validation::{validate_login, validate_registration};
use crate::{Error, Result};

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

impl ApiClient {
    /// Signs in and installs the new session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for blank input,
    /// [`Error::InvalidCredentials`] when the server refuses the login, or an
    /// error if the request fails.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        validate_login(username, password).map_err(Error::Validation)?;
        let username = username.trim();

        let url = self.config.endpoint(&["account", "login"])?;
        let request = self
            .http
            .request(Method::POST, url)
            .json(&Credentials { username, password });
        let response: TokenResponse = self.execute_json(request).await?;
        if response.token.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let session = Session::new(response.token, username);
        if let Err(e) = self.session.begin(session.clone()) {
            tracing::warn!("Signed in but could not persist session: {}", e);
        }
        info!("Logged in as {}", username);
        Ok(session)
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for input the server would reject, a
    /// server error with status 409 if the username is taken, or an error if
    /// the request fails.
    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        validate_registration(username, password).map_err(Error::Validation)?;
        let username = username.trim();

        let url = self.config.endpoint(&["account", "register"])?;
        let request = self
            .http
            .request(Method::POST, url)
            .json(&Credentials { username, password });
        match self.execute(request).await {
            Ok(_) => {
                info!("Registered {}", username);
                Ok(())
            }
            Err(Error::Server { status, .. }) if status == StatusCode::CONFLICT.as_u16() => {
                Err(Error::server(status, Some("Username already exists".to_string())))
            }
            Err(e) => Err(e),
        }
    }
}
