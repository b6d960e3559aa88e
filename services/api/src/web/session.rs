//! services/api/src/web/session.rs
//!
//! Signed session tokens. The cookie value is `hex(payload).hex(signature)`
//! where the payload is `user_id:role:expires_unix` and the signature is an
//! HMAC-SHA256 over the payload with the configured session secret. No
//! server-side session state exists; possession of a valid, unexpired token
//! is the whole proof.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use storefront_core::domain::Role;

type HmacSha256 = Hmac<Sha256>;

/// How long an issued session stays valid.
pub const SESSION_TTL_DAYS: i64 = 30;

/// The verified contents of a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// Mints a signed session token for the given user.
pub fn issue(secret: &str, user_id: Uuid, role: Role) -> String {
    let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);
    issue_at(secret, user_id, role, expires_at)
}

fn issue_at(secret: &str, user_id: Uuid, role: Role, expires_at: DateTime<Utc>) -> String {
    let payload = format!("{}:{}:{}", user_id, role.as_str(), expires_at.timestamp());
    let signature = sign(secret, payload.as_bytes());
    format!("{}.{}", hex::encode(payload.as_bytes()), hex::encode(signature))
}

/// Verifies a token's signature and expiry, returning its claims.
pub fn verify(secret: &str, token: &str) -> Option<SessionClaims> {
    let (payload_hex, signature_hex) = token.split_once('.')?;
    let payload = hex::decode(payload_hex).ok()?;
    let signature = hex::decode(signature_hex).ok()?;

    // Constant-time comparison via the Mac verifier.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(&payload);
    mac.verify_slice(&signature).ok()?;

    let payload = String::from_utf8(payload).ok()?;
    let mut parts = payload.splitn(3, ':');
    let user_id = Uuid::parse_str(parts.next()?).ok()?;
    let role = Role::parse(parts.next()?)?;
    let expires_at =
        DateTime::from_timestamp(parts.next()?.parse::<i64>().ok()?, 0)?;

    if expires_at <= Utc::now() {
        return None;
    }

    Some(SessionClaims {
        user_id,
        role,
        expires_at,
    })
}

fn sign(secret: &str, payload: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Pulls the session token out of a `Cookie` header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|c| {
        let c = c.trim();
        c.strip_prefix("session=")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_tokens_round_trip() {
        let user_id = Uuid::new_v4();
        let token = issue(SECRET, user_id, Role::Admin);
        let claims = verify(SECRET, &token).expect("token verifies");
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = issue(SECRET, Uuid::new_v4(), Role::Customer);
        let (payload_hex, signature_hex) = token.split_once('.').unwrap();

        // Swap the role inside the payload while keeping the old signature.
        let payload = String::from_utf8(hex::decode(payload_hex).unwrap()).unwrap();
        let forged_payload = payload.replace(":customer:", ":admin:");
        let forged = format!(
            "{}.{}",
            hex::encode(forged_payload.as_bytes()),
            signature_hex
        );
        assert!(verify(SECRET, &forged).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue(SECRET, Uuid::new_v4(), Role::Customer);
        assert!(verify("other-secret", &token).is_none());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = issue_at(
            SECRET,
            Uuid::new_v4(),
            Role::Customer,
            Utc::now() - Duration::hours(1),
        );
        assert!(verify(SECRET, &token).is_none());
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert!(verify(SECRET, "").is_none());
        assert!(verify(SECRET, "not-a-token").is_none());
        assert!(verify(SECRET, "abc.def").is_none());
    }

    #[test]
    fn cookie_header_parsing_finds_the_session() {
        assert_eq!(
            token_from_cookie_header("theme=dark; session=abc.def; other=1"),
            Some("abc.def")
        );
        assert_eq!(token_from_cookie_header("theme=dark"), None);
    }
}
