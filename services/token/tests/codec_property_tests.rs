//! Property-based tests for the credential codec.

use auth_token_service::jwt::{CredentialCodec, SigningSecret};
use auth_token_service::TokenError;
use proptest::prelude::*;
use test_utils::generators::{printable_origin_strategy, printable_subject_strategy, ttl_strategy};
use uuid::Uuid;

fn secret() -> SigningSecret {
    SigningSecret::new(b"codec-property-secret-at-least-32-bytes".to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_claims_survive_signing(
        subject in printable_subject_strategy(),
        origin in printable_origin_strategy(),
        ttl in ttl_strategy(),
    ) {
        let codec = CredentialCodec::new("auth-service");
        let jti = Uuid::new_v4().to_string();

        let token = codec.issue(&subject, &origin, ttl, &jti, &secret()).unwrap();
        let claims = codec.parse(&token, &secret()).unwrap();

        prop_assert_eq!(claims.user_id, subject);
        prop_assert_eq!(claims.client_ip, origin);
        prop_assert_eq!(claims.jti, jti);
        prop_assert_eq!(claims.iss, "auth-service");
        prop_assert_eq!(claims.exp - claims.iat, i64::try_from(ttl.as_secs()).unwrap());
    }

    #[test]
    fn prop_other_secret_rejected(subject in printable_subject_strategy(), ttl in ttl_strategy()) {
        let codec = CredentialCodec::new("auth-service");
        let token = codec.issue(&subject, "10.0.0.1", ttl, "jti", &secret()).unwrap();

        let other = SigningSecret::new(b"a-different-secret-also-32-bytes-long".to_vec());
        prop_assert!(matches!(codec.parse(&token, &other), Err(TokenError::InvalidCredential(_))));
    }
}
