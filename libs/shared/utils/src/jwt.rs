//! Bearer token validation shared by every cell behind `auth_middleware`.
//!
//! Only HS256 tokens signed with the project's JWT secret are accepted. The
//! resulting [`User`] carries the role names the scheduling policy reads.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

const SUPPORTED_ALGORITHM: &str = "HS256";

#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let [header_b64, claims_b64, signature_b64] = split_token(token)?;

    let header: TokenHeader = decode_json(header_b64, "header")?;
    if header.alg != SUPPORTED_ALGORITHM {
        debug!("Rejected token signed with {}", header.alg);
        return Err("Unsupported token algorithm".to_string());
    }

    verify_signature(header_b64, claims_b64, signature_b64, jwt_secret)?;

    let claims: JwtClaims = decode_json(claims_b64, "claims")?;
    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp().max(0) as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let user = User {
        roles: claims.role_names(),
        created_at: claims
            .iat
            .and_then(|issued| Utc.timestamp_opt(issued as i64, 0).single()),
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata: claims.user_metadata,
    };

    debug!("Token validated for {} with roles {:?}", user.id, user.roles);
    Ok(user)
}

fn split_token(token: &str) -> Result<[&str; 3], String> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(claims), Some(signature), None) => Ok([header, claims, signature]),
        _ => Err("Invalid token format".to_string()),
    }
}

fn verify_signature(header_b64: &str, claims_b64: &str, signature_b64: &str, secret: &str) -> Result<(), String> {
    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        "Invalid signature encoding".to_string()
    })?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());

    mac.verify_slice(&signature).map_err(|_| {
        debug!("Token signature verification failed");
        "Invalid token signature".to_string()
    })
}

fn decode_json<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| format!("Invalid {} encoding", what))?;

    serde_json::from_slice(&bytes).map_err(|e| {
        debug!("Failed to parse token {}: {}", what, e);
        format!("Invalid {} format", what)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn test_valid_token_carries_roles() {
        let user = TestUser::professional("pro@example.com");
        let token = JwtTestUtils::create_test_token(&user, SECRET, Some(1));

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.email.as_deref(), Some("pro@example.com"));
        assert!(validated.roles.contains(&"PROFESSIONAL".to_string()));
    }

    #[test]
    fn test_rejects_expired_wrong_signature_and_malformed() {
        let user = TestUser::default();

        let expired = JwtTestUtils::create_expired_token(&user, SECRET);
        assert_eq!(validate_token(&expired, SECRET).unwrap_err(), "Token expired");

        let forged = JwtTestUtils::create_invalid_signature_token(&user);
        assert_eq!(validate_token(&forged, SECRET).unwrap_err(), "Invalid token signature");

        let malformed = JwtTestUtils::create_malformed_token();
        assert!(validate_token(&malformed, SECRET).is_err());
        assert_eq!(validate_token("only.two", SECRET).unwrap_err(), "Invalid token format");
        assert_eq!(validate_token("a.b.c.d", SECRET).unwrap_err(), "Invalid token format");
    }

    #[test]
    fn test_rejects_algorithms_other_than_hs256() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(r#"{"sub":"intruder","app_metadata":{"roles":["ADMIN"]}}"#);

        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.{}", header, claims).as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        let token = format!("{}.{}.{}", header, claims, signature);
        assert_eq!(validate_token(&token, SECRET).unwrap_err(), "Unsupported token algorithm");
        assert_eq!(
            validate_token(&format!("{}.{}.", header, claims), SECRET).unwrap_err(),
            "Unsupported token algorithm"
        );
    }

    #[test]
    fn test_missing_secret() {
        assert_eq!(validate_token("a.b.c", "").unwrap_err(), "JWT secret is not set");
    }
}
