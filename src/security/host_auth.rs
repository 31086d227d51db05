//! Host access-token verification.
//!
//! Token issuance belongs to the external authentication service; the room
//! core only needs to map an opaque bearer token to an authenticated user id.
//! [`HostTokenVerifier`] is the seam; the HMAC implementation covers
//! single-process deployments where the auth service and the game server
//! share a signing secret.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::protocol::{GameError, UserId};

type HmacSha256 = Hmac<Sha256>;

/// Claims extracted from a verified host access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostAccessClaims {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

/// Verifies opaque host access tokens issued by the auth service.
pub trait HostTokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<HostAccessClaims, GameError>;
}

/// HMAC-SHA256 token verifier.
///
/// Token format: `base64url(user_id:expires_unix) "." base64url(mac)`, where
/// the MAC covers the decoded payload bytes.
pub struct HmacTokenVerifier {
    key: Vec<u8>,
}

impl HmacTokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    fn mac_for(&self, payload: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length.
        #[allow(clippy::expect_used)]
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    /// Sign a token for the given user. Production issuance lives in the auth
    /// service; this is for tests and development tooling.
    pub fn issue(&self, user_id: UserId, expires_at: DateTime<Utc>) -> String {
        let payload = format!("{}:{}", user_id.simple(), expires_at.timestamp());
        let mac = self.mac_for(payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(mac)
        )
    }
}

impl HostTokenVerifier for HmacTokenVerifier {
    fn verify(&self, token: &str) -> Result<HostAccessClaims, GameError> {
        let (payload_b64, mac_b64) = token
            .split_once('.')
            .ok_or(GameError::NotAuthenticated)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| GameError::NotAuthenticated)?;
        let presented_mac = URL_SAFE_NO_PAD
            .decode(mac_b64)
            .map_err(|_| GameError::NotAuthenticated)?;

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| GameError::Internal("HMAC key rejected".to_string()))?;
        mac.update(&payload);
        mac.verify_slice(&presented_mac)
            .map_err(|_| GameError::NotAuthenticated)?;

        let payload = String::from_utf8(payload).map_err(|_| GameError::NotAuthenticated)?;
        let (user_raw, expires_raw) = payload
            .split_once(':')
            .ok_or(GameError::NotAuthenticated)?;
        let user_id = UserId::parse_str(user_raw).map_err(|_| GameError::NotAuthenticated)?;
        let expires_unix: i64 = expires_raw
            .parse()
            .map_err(|_| GameError::NotAuthenticated)?;
        let expires_at = Utc
            .timestamp_opt(expires_unix, 0)
            .single()
            .ok_or(GameError::NotAuthenticated)?;

        if expires_at < Utc::now() {
            return Err(GameError::NotAuthenticated);
        }

        Ok(HostAccessClaims {
            user_id,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn issue_verify_round_trip() {
        let verifier = HmacTokenVerifier::new("test-secret");
        let user = Uuid::new_v4();
        let expires = Utc::now() + Duration::hours(1);

        let token = verifier.issue(user, expires);
        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.expires_at.timestamp(), expires.timestamp());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let verifier = HmacTokenVerifier::new("test-secret");
        let token = verifier.issue(Uuid::new_v4(), Utc::now() - Duration::minutes(1));
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let verifier = HmacTokenVerifier::new("test-secret");
        let token = verifier.issue(Uuid::new_v4(), Utc::now() + Duration::hours(1));

        let mut tampered = token.clone();
        tampered.replace_range(0..1, if token.starts_with('A') { "B" } else { "A" });
        assert!(verifier.verify(&tampered).is_err());

        assert!(verifier.verify("garbage").is_err());
        assert!(verifier.verify("").is_err());
        assert!(verifier.verify("a.b.c").is_err());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let issuer = HmacTokenVerifier::new("secret-a");
        let verifier = HmacTokenVerifier::new("secret-b");
        let token = issuer.issue(Uuid::new_v4(), Utc::now() + Duration::hours(1));
        assert!(verifier.verify(&token).is_err());
    }
}
