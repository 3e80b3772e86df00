//! Session claims and role definitions.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Roles a panel principal can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages the users of a single panel
    Admin,
    /// Manages admins, panels and system settings
    Superadmin,
}

impl Role {
    /// Every role, in privilege order.
    pub const ALL: [Role; 2] = [Role::Admin, Role::Superadmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by a session token.
///
/// Tokens are issued by the backend at login; the client only ever reads
/// these fields and never edits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (admin username)
    pub sub: String,
    /// Principal's role
    pub role: Role,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,
    /// Panel the principal is scoped to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<String>,
}

impl SessionClaims {
    /// Create claims expiring `expires_in_secs` from now.
    pub fn new(username: impl Into<String>, role: Role, expires_in_secs: i64) -> Self {
        Self {
            sub: username.into(),
            role,
            exp: Utc::now().timestamp() + expires_in_secs,
            panel: None,
        }
    }

    /// Scope the claims to a panel.
    pub fn with_panel(mut self, panel: impl Into<String>) -> Self {
        self.panel = Some(panel.into());
        self
    }

    pub fn username(&self) -> &str {
        &self.sub
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn panel(&self) -> Option<&str> {
        self.panel.as_deref()
    }

    /// A token is expired once `exp` is at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    /// Check against the current clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Absolute expiry, if `exp` is a representable timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Time left until expiry; negative once expired.
    ///
    /// `exp` comes from an unverified token, so out-of-range values saturate
    /// to `TimeDelta::MAX` / `TimeDelta::MIN`.
    pub fn expires_in(&self, now: DateTime<Utc>) -> TimeDelta {
        let saturated = if self.exp >= now.timestamp() {
            TimeDelta::MAX
        } else {
            TimeDelta::MIN
        };

        self.exp
            .checked_sub(now.timestamp())
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(saturated)
    }
}
