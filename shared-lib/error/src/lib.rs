//! Common error types for the Trex panel session gate.
//!
//! Every session error is terminal for the session: none of them is retried,
//! they are all resolved by a fresh login (or, for a role mismatch, by a
//! redirect to the landing view).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session-related errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No session token")]
    TokenAbsent,

    #[error("Malformed session token: {0}")]
    TokenMalformed(String),

    #[error("Session token expired")]
    TokenExpired,

    #[error("Role {role} may not access {view}")]
    RoleUnauthorized { role: String, view: String },

    #[error("Session rejected by backend")]
    BackendRejected,
}

impl SessionError {
    /// Whether recovery means sending the principal back to the login view.
    ///
    /// Only a role mismatch keeps the session; it redirects to the landing
    /// view instead.
    pub fn requires_login(&self) -> bool {
        !matches!(self, Self::RoleUnauthorized { .. })
    }
}

/// Token store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),
}

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Add details to the error response.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<&SessionError> for ErrorResponse {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::TokenAbsent => Self::new("SESSION_TOKEN_ABSENT", "Not logged in"),
            SessionError::TokenMalformed(reason) => {
                Self::new("SESSION_TOKEN_MALFORMED", "Invalid session token").with_details(reason.clone())
            }
            SessionError::TokenExpired => Self::new("SESSION_TOKEN_EXPIRED", "Session has expired"),
            SessionError::RoleUnauthorized { view, .. } => {
                Self::new("SESSION_ROLE_UNAUTHORIZED", "Access forbidden").with_details(view.clone())
            }
            SessionError::BackendRejected => {
                Self::new("SESSION_BACKEND_REJECTED", "Session rejected by server")
            }
        }
    }
}

impl From<SessionError> for ErrorResponse {
    fn from(err: SessionError) -> Self {
        Self::from(&err)
    }
}
