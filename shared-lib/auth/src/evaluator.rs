//! Access evaluation for protected views.
//!
//! Evaluation reads an explicit [`SessionContext`] and never touches the
//! token store, so it can run any number of times, in any interleaving, and
//! give the same answer for the same stored token and clock.

use chrono::{DateTime, Utc};
use error::SessionError;

use crate::claims::SessionClaims;
use crate::policy::{ViewRegistry, LANDING_VIEW, LOGIN_VIEW};
use crate::store::TokenStore;
use crate::token::{decode_token, DecodeFailure};

/// Everything the evaluator needs: the stored token and the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    token: Option<String>,
    now: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(token: Option<String>, now: DateTime<Utc>) -> Self {
        Self { token, now }
    }

    /// Snapshot the store as of `now`.
    pub fn from_store(store: &dyn TokenStore, now: DateTime<Utc>) -> Self {
        Self::new(store.read(), now)
    }

    /// Snapshot the store against the current clock.
    pub fn current(store: &dyn TokenStore) -> Self {
        Self::from_store(store, Utc::now())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Why a session is not valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    Absent,
    Malformed(DecodeFailure),
    Expired,
}

impl From<InvalidReason> for SessionError {
    fn from(reason: InvalidReason) -> Self {
        match reason {
            InvalidReason::Absent => SessionError::TokenAbsent,
            InvalidReason::Malformed(failure) => failure.into(),
            InvalidReason::Expired => SessionError::TokenExpired,
        }
    }
}

/// Outcome of evaluating a view entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessState {
    /// No usable session; go to login.
    Invalid(InvalidReason),
    /// Valid session whose role may not enter the view; go to the landing view.
    Unauthorized { claims: SessionClaims, view: String },
    /// Render the view.
    Authorized(SessionClaims),
}

impl AccessState {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    /// Where to send the principal, or `None` to render the view.
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            Self::Invalid(_) => Some(LOGIN_VIEW),
            Self::Unauthorized { .. } => Some(LANDING_VIEW),
            Self::Authorized(_) => None,
        }
    }

    /// Claims of a valid session, authorized or not.
    pub fn claims(&self) -> Option<&SessionClaims> {
        match self {
            Self::Invalid(_) => None,
            Self::Unauthorized { claims, .. } | Self::Authorized(claims) => Some(claims),
        }
    }

    pub fn into_result(self) -> Result<SessionClaims, SessionError> {
        match self {
            Self::Invalid(reason) => Err(reason.into()),
            Self::Unauthorized { claims, view } => Err(SessionError::RoleUnauthorized {
                role: claims.role.to_string(),
                view,
            }),
            Self::Authorized(claims) => Ok(claims),
        }
    }
}

/// Evaluates sessions against the route authorization policy.
#[derive(Debug, Clone, Default)]
pub struct AccessEvaluator {
    registry: ViewRegistry,
}

impl AccessEvaluator {
    pub fn new(registry: ViewRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    /// Is the session valid at all: present, decodable and unexpired.
    pub fn validate(&self, ctx: &SessionContext) -> Result<SessionClaims, InvalidReason> {
        let token = ctx.token().ok_or(InvalidReason::Absent)?;
        let claims = decode_token(token).map_err(InvalidReason::Malformed)?;

        if claims.is_expired_at(ctx.now()) {
            tracing::debug!("Session for {} expired at {}", claims.sub, claims.exp);
            return Err(InvalidReason::Expired);
        }

        Ok(claims)
    }

    /// Evaluate entry into `view`.
    ///
    /// Views absent from the registry only require a valid session.
    pub fn evaluate(&self, ctx: &SessionContext, view: &str) -> AccessState {
        let claims = match self.validate(ctx) {
            Ok(claims) => claims,
            Err(reason) => {
                tracing::debug!("Session invalid for {}: {:?}", view, reason);
                return AccessState::Invalid(reason);
            }
        };

        match self.registry.permitted_roles(view) {
            Some(roles) if !roles.contains(&claims.role) => {
                tracing::debug!("Role {} not permitted on {}", claims.role, view);
                AccessState::Unauthorized {
                    claims,
                    view: view.to_string(),
                }
            }
            _ => AccessState::Authorized(claims),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Role;
    use crate::store::MemoryTokenStore;
    use crate::token::issue_token;

    const SECRET: &str = "evaluator-secret";

    fn token_for(role: Role, exp: i64) -> String {
        let mut claims = SessionClaims::new("principal", role, 0);
        claims.exp = exp;
        issue_token(&claims, SECRET).unwrap()
    }

    fn ctx_with(token: Option<String>, now: DateTime<Utc>) -> SessionContext {
        SessionContext::new(token, now)
    }

    #[test]
    fn test_admin_on_superadmin_view_is_unauthorized() {
        let now = Utc::now();
        let evaluator = AccessEvaluator::default();
        let ctx = ctx_with(Some(token_for(Role::Admin, now.timestamp() + 3600)), now);

        let state = evaluator.evaluate(&ctx, "/admins");
        assert!(matches!(state, AccessState::Unauthorized { .. }));
        assert!(state.is_valid());
        assert_eq!(state.redirect_target(), Some(LANDING_VIEW));
    }

    #[test]
    fn test_expired_superadmin_is_invalid() {
        let now = Utc::now();
        let evaluator = AccessEvaluator::default();
        let ctx = ctx_with(Some(token_for(Role::Superadmin, now.timestamp() - 1)), now);

        let state = evaluator.evaluate(&ctx, "/admins");
        assert_eq!(state, AccessState::Invalid(InvalidReason::Expired));
        assert_eq!(state.redirect_target(), Some(LOGIN_VIEW));
    }

    #[test]
    fn test_no_token_is_invalid() {
        let evaluator = AccessEvaluator::default();
        let store = MemoryTokenStore::new();

        let state = evaluator.evaluate(&SessionContext::current(&store), "/");
        assert_eq!(state, AccessState::Invalid(InvalidReason::Absent));
        assert_eq!(state.redirect_target(), Some(LOGIN_VIEW));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let evaluator = AccessEvaluator::default();
        let ctx = ctx_with(Some("definitely not a token".into()), Utc::now());

        let state = evaluator.evaluate(&ctx, "/");
        assert!(matches!(state, AccessState::Invalid(InvalidReason::Malformed(_))));
        assert!(matches!(state.into_result(), Err(SessionError::TokenMalformed(_))));
    }

    #[test]
    fn test_expiry_dominates_role_and_view() {
        let now = Utc::now();
        let evaluator = AccessEvaluator::default();

        for role in Role::ALL {
            for exp in [now.timestamp(), now.timestamp() - 1, 0] {
                let ctx = ctx_with(Some(token_for(role, exp)), now);
                for view in ["/", "/admins", "/panels", "/settings", "/unregistered"] {
                    assert_eq!(
                        evaluator.evaluate(&ctx, view),
                        AccessState::Invalid(InvalidReason::Expired),
                        "{role} at {view} with exp {exp}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_permitted_roles_are_authorized() {
        let now = Utc::now();
        let evaluator = AccessEvaluator::default();

        for view in evaluator.registry().views() {
            for role in Role::ALL {
                let ctx = ctx_with(Some(token_for(role, now.timestamp() + 60)), now);
                let state = evaluator.evaluate(&ctx, view.path);
                if view.permits(role) {
                    assert!(state.is_authorized(), "{role} should enter {}", view.path);
                } else {
                    assert!(
                        matches!(state, AccessState::Unauthorized { .. }),
                        "{role} should be bounced from {}",
                        view.path
                    );
                }
            }
        }
    }

    #[test]
    fn test_unregistered_view_needs_only_validity() {
        let now = Utc::now();
        let evaluator = AccessEvaluator::default();
        let ctx = ctx_with(Some(token_for(Role::Admin, now.timestamp() + 60)), now);

        assert!(evaluator.evaluate(&ctx, "/profile").is_authorized());
    }

    #[test]
    fn test_evaluation_does_not_touch_store() {
        let now = Utc::now();
        let token = token_for(Role::Admin, now.timestamp() - 10);
        let store = MemoryTokenStore::with_token(token.clone());
        let evaluator = AccessEvaluator::default();

        let ctx = SessionContext::from_store(&store, now);
        let first = evaluator.evaluate(&ctx, "/");
        let second = evaluator.evaluate(&ctx, "/");

        assert_eq!(first, second);
        assert_eq!(store.read(), Some(token));
    }

    #[test]
    fn test_into_result_reports_role_and_view() {
        let now = Utc::now();
        let evaluator = AccessEvaluator::default();
        let ctx = ctx_with(Some(token_for(Role::Admin, now.timestamp() + 60)), now);

        let err = evaluator.evaluate(&ctx, "/settings").into_result().unwrap_err();
        assert_eq!(
            err,
            SessionError::RoleUnauthorized {
                role: "admin".to_string(),
                view: "/settings".to_string(),
            }
        );
        assert!(!err.requires_login());
    }
}
