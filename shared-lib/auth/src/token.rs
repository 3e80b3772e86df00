//! Session token decoding and issuance.
//!
//! Decoding reads the payload of a JWT without checking its signature. The
//! backend vets every token it receives, so a tampered token is rejected on
//! the next authenticated request no matter what the client decoded.

use error::SessionError;
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, Token, Unverified};
use sha2::Sha256;
use thiserror::Error;

use crate::claims::SessionClaims;

type HmacSha256 = Hmac<Sha256>;

/// Why a token could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeFailure {
    #[error("token is empty")]
    Empty,

    #[error("{0}")]
    Malformed(String),
}

impl From<DecodeFailure> for SessionError {
    fn from(failure: DecodeFailure) -> Self {
        SessionError::TokenMalformed(failure.to_string())
    }
}

/// Failure to sign a token.
#[derive(Debug, Error)]
#[error("token signing failed: {0}")]
pub struct SigningError(String);

/// Decode the claims of a session token.
///
/// Never panics: empty, truncated or non-JWT input yields a [`DecodeFailure`].
/// The header is accepted as any JSON value since only the payload matters.
pub fn decode_token(token: &str) -> Result<SessionClaims, DecodeFailure> {
    let token = token.trim();
    if token.is_empty() {
        return Err(DecodeFailure::Empty);
    }

    let parsed: Token<serde_json::Value, SessionClaims, Unverified<'_>> =
        Token::parse_unverified(token).map_err(|e| {
            tracing::warn!("Failed to decode session token: {}", e);
            DecodeFailure::Malformed(e.to_string())
        })?;

    Ok(parsed.claims().clone())
}

/// Sign claims as an HS256 token.
///
/// The gate itself never needs this; it is what a login backend does.
pub fn issue_token(claims: &SessionClaims, secret: &str) -> Result<String, SigningError> {
    let key = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        tracing::error!("Failed to create HMAC key: {}", e);
        SigningError(e.to_string())
    })?;

    claims.sign_with_key(&key).map_err(|e| {
        tracing::error!("Failed to encode JWT: {}", e);
        SigningError(e.to_string())
    })
}
