//! Token pair issuance and one-time-use refresh rotation.

use crate::error::{Rejection, TokenError};
use crate::jwt::{CredentialClaims, CredentialCodec, SigningSecret};
use crate::metrics;
use crate::notify::{Notifier, ORIGIN_ALERT_BODY, ORIGIN_ALERT_SUBJECT};
use crate::refresh::hasher::SecretHasher;
use crate::storage::{with_transaction, CredentialStore, StoreError};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Signing secret and validity window for one token class.
#[derive(Debug, Clone)]
pub struct TokenClass {
    /// HMAC signing secret
    pub secret: SigningSecret,
    /// Validity window from the moment of signing
    pub ttl: Duration,
}

impl TokenClass {
    /// Create a token class.
    pub fn new(secret: SigningSecret, ttl: Duration) -> Self {
        TokenClass { secret, ttl }
    }
}

/// Signed access and refresh tokens handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Short-lived bearer token
    pub access_token: String,
    /// One-time-use token for the next rotation
    pub refresh_token: String,
}

/// Collaborators and settings for [`TokenLifecycleManager`].
pub struct ManagerParams {
    /// `iss` claim on every token
    pub issuer: String,
    /// Access token secret and lifetime
    pub access: TokenClass,
    /// Refresh token secret and lifetime
    pub refresh: TokenClass,
    /// Digest function for stored refresh tokens
    pub hasher: SecretHasher,
    /// Recipient of origin-anomaly alerts
    pub alert_recipient: String,
    /// Refresh token records
    pub store: Arc<dyn CredentialStore>,
    /// Alert sink for origin anomalies
    pub notifier: Arc<dyn Notifier>,
}

/// Freshly signed pair plus what must be persisted for the refresh half.
struct MintedPair {
    pair: TokenPair,
    refresh_id: Uuid,
    refresh_hash: String,
}

/// Issues token pairs and performs one-time-use refresh rotation.
///
/// Holds no mutable state; all durable state lives in the credential store,
/// so one instance can serve any number of concurrent requests.
pub struct TokenLifecycleManager {
    codec: CredentialCodec,
    hasher: SecretHasher,
    access: TokenClass,
    refresh: TokenClass,
    alert_recipient: String,
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
}

impl TokenLifecycleManager {
    /// Create a manager from its collaborators.
    pub fn new(params: ManagerParams) -> Self {
        TokenLifecycleManager {
            codec: CredentialCodec::new(params.issuer),
            hasher: params.hasher,
            access: params.access,
            refresh: params.refresh,
            alert_recipient: params.alert_recipient,
            store: params.store,
            notifier: params.notifier,
        }
    }

    /// Mint a new pair for `user_id` bound to `client_ip` and persist the
    /// refresh token's digest.
    pub async fn issue(&self, user_id: Uuid, client_ip: IpAddr) -> Result<TokenPair, TokenError> {
        let minted = self.mint(user_id, &client_ip.to_string()).await?;

        self.store
            .save(user_id, minted.refresh_id, &minted.refresh_hash)
            .await
            .map_err(|e| TokenError::issuance(format!("save refresh token: {e}")))?;

        metrics::record_token_issued("access");
        metrics::record_token_issued("refresh");
        info!(
            user_id = %user_id,
            token_id = %minted.refresh_id,
            "Issued token pair"
        );

        Ok(minted.pair)
    }

    /// Exchange a refresh token for a new pair bound to `client_ip`.
    ///
    /// A refresh token authorizes at most one successful rotation. Every
    /// reason a token is unusable surfaces as the same
    /// [`TokenError::InvalidCredential`] kind.
    pub async fn rotate(&self, refresh_token: &str, client_ip: IpAddr) -> Result<TokenPair, TokenError> {
        let result = self.try_rotate(refresh_token, client_ip).await;

        let status = match &result {
            Ok(_) => "success",
            Err(TokenError::InvalidCredential(_)) => "invalid",
            Err(TokenError::NotificationFailed(_)) => "notification_failed",
            Err(_) => "failed",
        };
        metrics::record_rotation(status);

        if let Err(TokenError::InvalidCredential(rejection)) = &result {
            debug!(reason = %rejection, "Rejected refresh token");
        }
        result
    }

    async fn try_rotate(&self, refresh_token: &str, client_ip: IpAddr) -> Result<TokenPair, TokenError> {
        let claims = self.codec.parse(refresh_token, &self.refresh.secret)?;
        let (user_id, token_id) = claim_ids(&claims)?;

        let stored = match self.store.get(user_id, token_id).await {
            Ok(stored) => stored,
            Err(StoreError::NotFound) => return Err(TokenError::InvalidCredential(Rejection::Unknown)),
            Err(e) => return Err(TokenError::rotation(format!("get refresh token: {e}"))),
        };

        let digest_matches = self
            .verify_blocking(refresh_token, &stored.token_hash)
            .await?;
        let expired = claims.is_expired();
        if stored.revoked || !digest_matches || expired {
            debug!(
                user_id = %user_id,
                token_id = %token_id,
                revoked = stored.revoked,
                digest_matches,
                expired,
                "Refresh token unusable"
            );
            return Err(TokenError::InvalidCredential(Rejection::Unusable));
        }

        let origin = client_ip.to_string();
        if claims.client_ip != origin {
            warn!(
                user_id = %user_id,
                token_id = %token_id,
                issued_to = %claims.client_ip,
                presented_from = %origin,
                "Refresh token presented from a new address"
            );
            let sent = self
                .notifier
                .send(&self.alert_recipient, ORIGIN_ALERT_SUBJECT, ORIGIN_ALERT_BODY)
                .await;
            metrics::record_origin_anomaly(sent.is_ok());
            sent.map_err(|e| TokenError::notification(e.to_string()))?;
        }

        let minted = self
            .mint(user_id, &origin)
            .await
            .map_err(|e| TokenError::rotation(e.to_string()))?;

        let new_id = minted.refresh_id;
        let new_hash = minted.refresh_hash.clone();
        let committed = with_transaction::<_, (), StoreError, _>(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                tx.revoke(user_id, token_id).await?;
                tx.save(user_id, new_id, &new_hash).await
            })
        })
        .await;

        match committed {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                return Err(TokenError::InvalidCredential(Rejection::AlreadyRotated));
            }
            Err(e) => return Err(TokenError::rotation(format!("revoke and replace: {e}"))),
        }

        metrics::record_token_issued("access");
        metrics::record_token_issued("refresh");
        info!(
            user_id = %user_id,
            old_token_id = %token_id,
            new_token_id = %new_id,
            "Rotated refresh token"
        );

        Ok(minted.pair)
    }

    async fn mint(&self, user_id: Uuid, origin: &str) -> Result<MintedPair, TokenError> {
        let subject = user_id.to_string();

        let access_id = Uuid::new_v4();
        let access_token = self.codec.issue(
            &subject,
            origin,
            self.access.ttl,
            &access_id.to_string(),
            &self.access.secret,
        )?;

        let mut refresh_id = Uuid::new_v4();
        while refresh_id == access_id {
            refresh_id = Uuid::new_v4();
        }
        let refresh_token = self.codec.issue(
            &subject,
            origin,
            self.refresh.ttl,
            &refresh_id.to_string(),
            &self.refresh.secret,
        )?;

        let refresh_hash = self.digest_blocking(&refresh_token).await?;

        Ok(MintedPair {
            pair: TokenPair {
                access_token,
                refresh_token,
            },
            refresh_id,
            refresh_hash,
        })
    }

    async fn digest_blocking(&self, token: &str) -> Result<String, TokenError> {
        let hasher = self.hasher.clone();
        let token = token.to_string();
        tokio::task::spawn_blocking(move || hasher.digest(&token))
            .await
            .map_err(|e| TokenError::issuance(format!("hash task: {e}")))?
    }

    async fn verify_blocking(&self, token: &str, stored: &str) -> Result<bool, TokenError> {
        let hasher = self.hasher.clone();
        let token = token.to_string();
        let stored = stored.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&token, &stored))
            .await
            .map_err(|e| TokenError::rotation(format!("verify task: {e}")))
    }
}

fn claim_ids(claims: &CredentialClaims) -> Result<(Uuid, Uuid), TokenError> {
    let user_id = Uuid::parse_str(&claims.user_id)
        .map_err(|_| TokenError::InvalidCredential(Rejection::MalformedClaims))?;
    let token_id = Uuid::parse_str(&claims.jti)
        .map_err(|_| TokenError::InvalidCredential(Rejection::MalformedClaims))?;
    Ok((user_id, token_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use crate::storage::InMemoryCredentialStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingNotifier {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, _recipient: &str, _subject: &str, _body: &str) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NotifyError("smtp down".to_string()));
            }
            Ok(())
        }
    }

    fn manager(store: Arc<InMemoryCredentialStore>, notifier: Arc<CountingNotifier>) -> TokenLifecycleManager {
        TokenLifecycleManager::new(ManagerParams {
            issuer: "auth-service".to_string(),
            access: TokenClass::new(
                SigningSecret::new(b"access-secret-for-unit-tests-32bytes".to_vec()),
                Duration::from_secs(900),
            ),
            refresh: TokenClass::new(
                SigningSecret::new(b"refresh-secret-for-unit-tests-32byte".to_vec()),
                Duration::from_secs(3600),
            ),
            hasher: SecretHasher::new(64, 1, 1).unwrap(),
            alert_recipient: "security@example.com".to_string(),
            store,
            notifier,
        })
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_issue_persists_refresh_digest_only() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let manager = manager(store.clone(), Arc::default());
        let user = Uuid::new_v4();

        let pair = manager.issue(user, ip("10.0.0.1")).await.unwrap();

        let records = store.records_for(user).await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].revoked);
        assert_ne!(records[0].token_hash, pair.refresh_token);
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn test_access_token_not_accepted_for_rotation() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let manager = manager(store, Arc::default());

        let pair = manager.issue(Uuid::new_v4(), ip("10.0.0.1")).await.unwrap();
        let result = manager.rotate(&pair.access_token, ip("10.0.0.1")).await;

        assert!(matches!(
            result,
            Err(TokenError::InvalidCredential(Rejection::Malformed))
        ));
    }

    #[tokio::test]
    async fn test_rotation_same_origin_skips_notification() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let notifier = Arc::new(CountingNotifier::default());
        let manager = manager(store, notifier.clone());

        let pair = manager.issue(Uuid::new_v4(), ip("10.0.0.1")).await.unwrap();
        manager.rotate(&pair.refresh_token, ip("10.0.0.1")).await.unwrap();

        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_notification_leaves_store_untouched() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let notifier = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let manager = manager(store.clone(), notifier.clone());
        let user = Uuid::new_v4();

        let pair = manager.issue(user, ip("10.0.0.1")).await.unwrap();
        let result = manager.rotate(&pair.refresh_token, ip("10.0.0.2")).await;

        assert!(matches!(result, Err(TokenError::NotificationFailed(_))));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        let records = store.records_for(user).await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].revoked);
    }

    #[test]
    fn test_claim_ids_require_uuids() {
        let claims = CredentialClaims::new(
            "auth-service".to_string(),
            "not-a-uuid".to_string(),
            "10.0.0.1".to_string(),
            Uuid::new_v4().to_string(),
            60,
        );
        assert!(matches!(
            claim_ids(&claims),
            Err(TokenError::InvalidCredential(Rejection::MalformedClaims))
        ));
    }
}
