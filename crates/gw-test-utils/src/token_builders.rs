//! Builders for signed access tokens in tests.
//!
//! Tokens are signed with the fixture RSA key whose public half is served
//! by [`crate::MockIdp`] as a JWKS document, so the gateway's real verifier
//! accepts them.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

/// Key ID published in the fixture JWKS document.
pub const TEST_KID: &str = "test-key";

pub const RSA_PRIVATE_PEM: &str =
    include_str!("../../gw-service/fixtures/test-keys/rsa-private.pem");
pub const JWKS_JSON: &str = include_str!("../../gw-service/fixtures/test-keys/jwks.json");

fn sign(kid: &str, claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(RSA_PRIVATE_PEM.as_bytes())
        .expect("fixture RSA key must parse");
    encode(&header, claims, &key).expect("test token signing must succeed")
}

/// Access token with realm roles, valid for `expires_in_secs` from now.
pub fn signed_access_token(
    issuer: &str,
    sub: &str,
    realm_roles: &[&str],
    expires_in_secs: i64,
) -> String {
    let now = Utc::now().timestamp();
    sign(
        TEST_KID,
        &json!({
            "sub": sub,
            "iss": issuer,
            "exp": now + expires_in_secs,
            "iat": now,
            "preferred_username": sub,
            "realm_access": { "roles": realm_roles }
        }),
    )
}

/// Access token that expired an hour ago.
pub fn expired_access_token(issuer: &str, sub: &str) -> String {
    let now = Utc::now().timestamp();
    sign(
        TEST_KID,
        &json!({
            "sub": sub,
            "iss": issuer,
            "exp": now - 3_600,
            "iat": now - 7_200,
            "realm_access": { "roles": ["user"] }
        }),
    )
}

/// Token signed with a key ID the JWKS document does not contain.
pub fn unknown_key_token(issuer: &str, sub: &str) -> String {
    let now = Utc::now().timestamp();
    sign(
        "rotated-away",
        &json!({
            "sub": sub,
            "iss": issuer,
            "exp": now + 300,
            "iat": now
        }),
    )
}
