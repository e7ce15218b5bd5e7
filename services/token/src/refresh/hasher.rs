//! Refresh token digests.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::TokenError;

/// One-way digests for refresh tokens at rest.
///
/// Tokens are first compressed with SHA-256 so the Argon2id stage sees a
/// fixed 32-byte input whatever the token length. Output is a PHC string that
/// carries its own salt and parameters.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    argon2: Argon2<'static>,
}

impl SecretHasher {
    /// Memory cost in KiB used by [`SecretHasher::default`].
    pub const DEFAULT_MEMORY_KIB: u32 = 19_456;
    /// Iteration count used by [`SecretHasher::default`].
    pub const DEFAULT_ITERATIONS: u32 = 2;

    /// Build a hasher with an explicit work factor.
    ///
    /// # Errors
    ///
    /// Returns `IssuanceFailed` if Argon2 rejects the parameters.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, TokenError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| TokenError::issuance(format!("argon2 params: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Salted digest of `token` as a PHC string.
    ///
    /// # Errors
    ///
    /// Returns `IssuanceFailed` if salting or hashing fails.
    pub fn digest(&self, token: &str) -> Result<String, TokenError> {
        let compressed = Self::compress(token);
        let salt_bytes: [u8; 16] = rand::thread_rng().gen();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| TokenError::issuance(format!("encode salt: {e}")))?;

        self.argon2
            .hash_password(&compressed, &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| TokenError::issuance(format!("hash token: {e}")))
    }

    /// Constant-time check of `token` against a stored digest.
    pub fn verify(&self, token: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        self.argon2
            .verify_password(&Self::compress(token), &parsed)
            .is_ok()
    }

    fn compress(token: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.finalize().into()
    }
}

impl Default for SecretHasher {
    fn default() -> Self {
        let params = Params::new(Self::DEFAULT_MEMORY_KIB, Self::DEFAULT_ITERATIONS, 1, None)
            .unwrap_or_default();
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> SecretHasher {
        SecretHasher::new(Params::MIN_M_COST.max(64), 1, 1).unwrap()
    }

    #[test]
    fn test_digest_verifies() {
        let hasher = hasher();
        let digest = hasher.digest("refresh-token").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify("refresh-token", &digest));
        assert!(!hasher.verify("refresh-tokem", &digest));
    }

    #[test]
    fn test_digest_is_salted() {
        let hasher = hasher();
        let d1 = hasher.digest("same-token").unwrap();
        let d2 = hasher.digest("same-token").unwrap();

        assert_ne!(d1, d2);
        assert!(hasher.verify("same-token", &d1));
        assert!(hasher.verify("same-token", &d2));
    }

    #[test]
    fn test_long_token_distinguished() {
        let hasher = hasher();
        let prefix = "x".repeat(200);
        let a = format!("{prefix}a");
        let b = format!("{prefix}b");
        let digest = hasher.digest(&a).unwrap();

        assert!(hasher.verify(&a, &digest));
        assert!(!hasher.verify(&b, &digest));
    }

    #[test]
    fn test_malformed_digest_is_false() {
        let hasher = hasher();
        assert!(!hasher.verify("token", ""));
        assert!(!hasher.verify("token", "not-a-phc-string"));
        assert!(!hasher.verify("token", "$2a$10$abcdefghijklmnopqrstuv"));
    }

    #[test]
    fn test_default_work_factor() {
        let hasher = SecretHasher::default();
        assert_eq!(hasher.argon2.params().m_cost(), SecretHasher::DEFAULT_MEMORY_KIB);
        assert_eq!(hasher.argon2.params().t_cost(), SecretHasher::DEFAULT_ITERATIONS);
    }
}
