//! Session token persistence.
//!
//! The store holds a single token slot. Writes are last-write-wins; there is
//! nothing to merge since a session token is one scalar value.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use axum_extra::extract::cookie::{Cookie, SameSite};
use error::{SessionError, StoreError};
use time::OffsetDateTime;

use crate::policy::LOGIN_VIEW;

/// Cookie name the token is kept under.
pub const TOKEN_COOKIE: &str = "access_token";

/// How long a saved token is retained.
pub const TOKEN_RETENTION_DAYS: i64 = 7;

/// A single-slot session token store.
pub trait TokenStore: Send + Sync {
    /// Persist a token, replacing any previous one.
    fn save(&self, token: &str) -> Result<(), StoreError>;

    /// The stored token, if any.
    fn read(&self) -> Option<String>;

    /// Remove the token. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-process token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, token: &str) -> Result<(), StoreError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn read(&self) -> Option<String> {
        self.slot().clone()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.slot().take();
        Ok(())
    }
}

/// Attributes applied to the token cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    /// Retention window
    pub retention: time::Duration,
    /// Only send the cookie over an encrypted transport
    pub secure: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            retention: time::Duration::days(TOKEN_RETENTION_DAYS),
            secure: false,
        }
    }
}

impl CookiePolicy {
    /// Policy for a panel served from `origin`; secure iff it is https.
    pub fn for_origin(origin: &str) -> Self {
        Self {
            secure: origin.trim().to_ascii_lowercase().starts_with("https://"),
            ..Self::default()
        }
    }

    /// Build the token cookie as of `now`.
    pub fn build_cookie(&self, token: &str, now: OffsetDateTime) -> Cookie<'static> {
        Cookie::build((TOKEN_COOKIE, token.to_string()))
            .path("/")
            .same_site(SameSite::Strict)
            .secure(self.secure)
            .max_age(self.retention)
            .expires(now + self.retention)
            .build()
    }
}

/// Token store persisting the cookie to a file, one `Set-Cookie` line.
#[derive(Debug, Clone)]
pub struct CookieFileStore {
    path: PathBuf,
    policy: CookiePolicy,
}

impl CookieFileStore {
    pub fn new(path: impl Into<PathBuf>, policy: CookiePolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored cookie, honouring its expiry as of `now`.
    pub fn read_at(&self, now: OffsetDateTime) -> Result<Option<String>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let line = content.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let cookie = Cookie::parse(line.to_string())
            .map_err(|e| StoreError::InvalidCookie(e.to_string()))?;

        if cookie.name() != TOKEN_COOKIE {
            return Err(StoreError::InvalidCookie(format!(
                "unexpected cookie name {}",
                cookie.name()
            )));
        }

        if let Some(expires) = cookie.expires_datetime() {
            if expires <= now {
                tracing::debug!("Stored token cookie lapsed at {}", expires);
                return Ok(None);
            }
        }

        let value = cookie.value();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }
}

impl TokenStore for CookieFileStore {
    fn save(&self, token: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let cookie = self.policy.build_cookie(token, OffsetDateTime::now_utc());
        std::fs::write(&self.path, format!("{}\n", cookie))?;

        Ok(())
    }

    fn read(&self) -> Option<String> {
        match self.read_at(OffsetDateTime::now_utc()) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Ignoring unreadable token cookie {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// End the session and return the view to send the principal to.
pub fn logout(store: &dyn TokenStore) -> Result<&'static str, StoreError> {
    store.clear()?;
    tracing::info!("Session cleared by logout");
    Ok(LOGIN_VIEW)
}

/// Handle an authorization failure reported by the backend.
///
/// The token is dropped even when the client still believes it is valid;
/// the caller must redirect to the login view.
pub fn invalidate_rejected(store: &dyn TokenStore) -> SessionError {
    if let Err(e) = store.clear() {
        tracing::error!("Failed to clear rejected session token: {}", e);
    }
    tracing::warn!("Backend rejected session token; redirecting to login");
    SessionError::BackendRejected
}
