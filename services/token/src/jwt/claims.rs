//! Token claims.

use serde::{Deserialize, Serialize};

/// Claims shared by access and refresh tokens.
///
/// Field names are the wire contract. Every field is required on decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialClaims {
    /// Subject (user) identifier
    pub user_id: String,
    /// Client address observed when the token was minted
    pub client_ip: String,
    /// Issuer
    pub iss: String,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Unique token identifier
    pub jti: String,
}

impl CredentialClaims {
    /// Claims issued now and valid for `ttl_seconds`.
    pub fn new(
        issuer: String,
        user_id: String,
        client_ip: String,
        jti: String,
        ttl_seconds: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        CredentialClaims {
            user_id,
            client_ip,
            iss: issuer,
            iat: now,
            exp: now.saturating_add(ttl_seconds),
            jti,
        }
    }

    /// Expired at or before `timestamp`.
    pub fn is_expired_at(&self, timestamp: i64) -> bool {
        self.exp <= timestamp
    }

    /// Expired at or before the current instant.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}
