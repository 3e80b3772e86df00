//! Authenticated REST client for the panel backend.
//!
//! Every request carries the stored token as a bearer credential. A `401`
//! from the backend ends the session: the store is cleared and the caller is
//! told to send the principal back to the login view.

use std::sync::Arc;
use std::time::Duration;

use auth::{decode_token, invalidate_rejected, logout, SessionClaims, TokenStore};
use error::{SessionError, StoreError};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GatewayConfig;

const LOGIN_FAILED_MESSAGE: &str = "Failed to login. Please check your credentials.";

/// Errors that can occur while talking to the backend
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    LoginFailed(String),

    #[error("Server returned {status}: {message}")]
    Status { status: StatusCode, message: String },
}

/// Response from the login endpoint
#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Error payload; the backend uses `detail`, older routes `message`.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    detail: Option<serde_json::Value>,

    #[serde(default)]
    message: Option<String>,
}

/// Panel API client
pub struct ApiClient {
    http: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// Create a client for `base_url` (origin plus panel prefix).
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<dyn TokenStore>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
        })
    }

    pub fn from_config(config: &GatewayConfig, store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        Self::new(config.base_url(), store, config.request_timeout())
    }

    pub fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Exchange credentials for a session token and store it.
    ///
    /// Any previous session is overwritten. A token that does not decode is
    /// discarded and reported as a failed login. A `401` drops the stored
    /// session like any other rejected request.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionClaims, ClientError> {
        let response = self
            .http
            .post(self.url("login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Login for {} failed with {}", username, status);
            if status == StatusCode::UNAUTHORIZED {
                invalidate_rejected(self.store.as_ref());
            }
            return Err(ClientError::LoginFailed(
                error_message(&body).unwrap_or_else(|| LOGIN_FAILED_MESSAGE.to_string()),
            ));
        }

        let login: LoginResponse = response.json().await?;
        self.store.save(&login.access_token)?;

        match decode_token(&login.access_token) {
            Ok(claims) => {
                tracing::info!("Logged in as {} ({})", claims.sub, claims.role);
                Ok(claims)
            }
            Err(e) => {
                tracing::warn!("Login returned an unusable token: {}", e);
                self.store.clear()?;
                Err(ClientError::LoginFailed(LOGIN_FAILED_MESSAGE.to_string()))
            }
        }
    }

    /// Clear the session; returns the view to redirect to.
    pub fn logout(&self) -> Result<&'static str, ClientError> {
        Ok(logout(self.store.as_ref())?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.store.read() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(invalidate_rejected(self.store.as_ref()).into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or(body);
            tracing::warn!("Backend returned {}: {}", status, message);
            return Err(ClientError::Status { status, message });
        }

        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.send(self.http.get(self.url(path))).await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.http.post(self.url(path)).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.http.put(self.url(path)).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(self.http.delete(self.url(path))).await?;
        Ok(())
    }

    /// Fetch a raw body, e.g. a database backup.
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let response = self.send(self.http.get(self.url(path))).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let payload: ErrorPayload = serde_json::from_str(body).ok()?;

    match payload.detail {
        Some(serde_json::Value::String(detail)) => Some(detail),
        Some(detail) => Some(detail.to_string()),
        None => payload.message,
    }
}
