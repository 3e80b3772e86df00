//! Client-side session gate for the Trex panel.
//!
//! Reads the bearer token from the store, decodes its claims, checks expiry
//! and matches the principal's role against the protected-view registry.

mod claims;
mod evaluator;
mod policy;
mod store;
mod token;

pub use claims::{Role, SessionClaims};
pub use evaluator::{AccessEvaluator, AccessState, InvalidReason, SessionContext};
pub use policy::{PolicyError, ProtectedView, ViewRegistry, LANDING_VIEW, LOGIN_VIEW};
pub use store::{
    invalidate_rejected, logout, CookieFileStore, CookiePolicy, MemoryTokenStore, TokenStore,
    TOKEN_COOKIE, TOKEN_RETENTION_DAYS,
};
pub use token::{decode_token, issue_token, DecodeFailure, SigningError};
