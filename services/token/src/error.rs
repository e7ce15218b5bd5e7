//! Error types for token issuance and rotation.
//!
//! Every failure carries the stage that produced it for logging, while
//! [`TokenError::kind`] exposes only the coarse classification to callers
//! outside the service.

use std::fmt;
use thiserror::Error;

/// Why a presented refresh token was rejected.
///
/// Only ever shown in logs. Callers see a single `InvalidCredential` kind
/// regardless of the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Signature, algorithm or structure did not verify
    Malformed,
    /// Subject or token id claim is not a UUID
    MalformedClaims,
    /// No record exists for the subject and token id
    Unknown,
    /// Record revoked, digest mismatch or token expired
    Unusable,
    /// A concurrent rotation consumed the token first
    AlreadyRotated,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Malformed => "malformed or forged token",
            Self::MalformedClaims => "malformed claims",
            Self::Unknown => "unknown token",
            Self::Unusable => "revoked, mismatched or expired token",
            Self::AlreadyRotated => "token already rotated",
        };
        f.write_str(reason)
    }
}

/// Coarse error classification visible outside the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The presented credential cannot be used
    InvalidCredential,
    /// Initial issuance could not complete
    IssuanceFailed,
    /// The origin-anomaly alert could not be sent
    NotificationFailed,
    /// The revoke-and-replace transaction could not complete
    RotationFailed,
}

/// Errors returned by the token lifecycle manager.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The presented refresh token is not valid.
    #[error("invalid credential: {0}")]
    InvalidCredential(Rejection),

    /// Token pair could not be minted or persisted.
    #[error("issuance failed: {0}")]
    IssuanceFailed(String),

    /// Origin-anomaly alert delivery failed.
    #[error("notification failed: {0}")]
    NotificationFailed(String),

    /// Revoke-and-replace did not commit.
    #[error("rotation failed: {0}")]
    RotationFailed(String),
}

impl TokenError {
    /// Create an issuance error.
    #[must_use]
    pub fn issuance(msg: impl Into<String>) -> Self {
        Self::IssuanceFailed(msg.into())
    }

    /// Create a notification error.
    #[must_use]
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::NotificationFailed(msg.into())
    }

    /// Create a rotation error.
    #[must_use]
    pub fn rotation(msg: impl Into<String>) -> Self {
        Self::RotationFailed(msg.into())
    }

    /// Coarse kind, safe to expose.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredential(_) => ErrorKind::InvalidCredential,
            Self::IssuanceFailed(_) => ErrorKind::IssuanceFailed,
            Self::NotificationFailed(_) => ErrorKind::NotificationFailed,
            Self::RotationFailed(_) => ErrorKind::RotationFailed,
        }
    }

    /// Whether the transport should answer "unauthorized".
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::InvalidCredential(_))
    }
}
