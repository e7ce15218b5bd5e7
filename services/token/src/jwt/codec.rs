//! Signing and parsing of self-contained tokens.
//!
//! Tokens are HS512 JWTs. Parsing checks signature, algorithm and claim shape
//! only; expiry is left to the caller so a stale token and a forged one stay
//! distinguishable in logs.

use crate::error::{Rejection, TokenError};
use crate::jwt::claims::CredentialClaims;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

const ALGORITHM: Algorithm = Algorithm::HS512;

/// HMAC secret for one token class.
#[derive(Clone)]
pub struct SigningSecret {
    raw: Zeroizing<Vec<u8>>,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningSecret {
    /// Wrap raw secret bytes.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        let raw = Zeroizing::new(secret.into());
        let encoding = EncodingKey::from_secret(&raw);
        let decoding = DecodingKey::from_secret(&raw);
        Self {
            raw,
            encoding,
            decoding,
        }
    }
}

impl PartialEq for SigningSecret {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecret")
            .field("len", &self.raw.len())
            .finish_non_exhaustive()
    }
}

/// Builds and parses signed tokens for a fixed issuer.
#[derive(Debug, Clone)]
pub struct CredentialCodec {
    issuer: String,
    validation: Validation,
}

impl CredentialCodec {
    /// Codec that stamps `issuer` on every token.
    pub fn new(issuer: impl Into<String>) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = ["exp", "iat", "iss", "jti"]
            .into_iter()
            .map(String::from)
            .collect::<HashSet<_>>();

        CredentialCodec {
            issuer: issuer.into(),
            validation,
        }
    }

    /// Sign a new token.
    pub fn issue(
        &self,
        subject: &str,
        origin: &str,
        ttl: Duration,
        credential_id: &str,
        secret: &SigningSecret,
    ) -> Result<String, TokenError> {
        let ttl_seconds = i64::try_from(ttl.as_secs())
            .map_err(|_| TokenError::issuance(format!("ttl out of range: {ttl:?}")))?;

        let claims = CredentialClaims::new(
            self.issuer.clone(),
            subject.to_string(),
            origin.to_string(),
            credential_id.to_string(),
            ttl_seconds,
        );

        encode(&Header::new(ALGORITHM), &claims, &secret.encoding)
            .map_err(|e| TokenError::issuance(format!("sign token: {e}")))
    }

    /// Verify the signature and decode the claims. Expiry is not checked.
    pub fn parse(&self, token: &str, secret: &SigningSecret) -> Result<CredentialClaims, TokenError> {
        decode::<CredentialClaims>(token, &secret.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token failed to parse");
                TokenError::InvalidCredential(Rejection::Malformed)
            })
    }
}
