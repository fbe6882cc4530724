//! Wiremock-backed stand-in for the identity provider.
//!
//! Serves the JWKS document for the shared test signing key and offers
//! mount helpers for the token endpoint shapes the gateway exercises.

use crate::token_builders::JWKS_JSON;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REALM: &str = "demo";

pub struct MockIdp {
    pub server: MockServer,
}

impl MockIdp {
    /// Start the mock IdP with the JWKS endpoint already mounted.
    pub async fn start() -> Self {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!(
                "/realms/{REALM}/protocol/openid-connect/certs"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS_JSON, "application/json"))
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    pub fn issuer(&self) -> String {
        format!("{}/realms/{REALM}", self.server.uri())
    }

    fn token_path() -> String {
        format!("/realms/{REALM}/protocol/openid-connect/token")
    }

    fn token_body(access_token: &str, refresh_token: &str) -> serde_json::Value {
        json!({
            "access_token": access_token,
            "refresh_token": refresh_token,
            "expires_in": 300,
            "token_type": "Bearer"
        })
    }

    /// Accept any authorization-code exchange with the given token pair.
    pub async fn mount_exchange_success(&self, access_token: &str, refresh_token: &str) {
        Mock::given(method("POST"))
            .and(path(Self::token_path()))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(Self::token_body(access_token, refresh_token)),
            )
            .mount(&self.server)
            .await;
    }

    /// Rotate a specific refresh token into a new pair.
    ///
    /// Matching on the old token value makes rotation tests precise: a
    /// replayed old token will not match a rotation mounted for the new one.
    pub async fn mount_refresh_rotation(
        &self,
        old_refresh_token: &str,
        access_token: &str,
        new_refresh_token: &str,
    ) {
        Mock::given(method("POST"))
            .and(path(Self::token_path()))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains(format!(
                "refresh_token={old_refresh_token}"
            )))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(Self::token_body(access_token, new_refresh_token)),
            )
            .mount(&self.server)
            .await;
    }

    /// Rotate a specific refresh token exactly once.
    ///
    /// Mirrors IdP-side one-time use: after the first match the mock is
    /// exhausted and a replay of the old token falls through to whatever
    /// rejection is mounted after it.
    pub async fn mount_refresh_rotation_once(
        &self,
        old_refresh_token: &str,
        access_token: &str,
        new_refresh_token: &str,
    ) {
        Mock::given(method("POST"))
            .and(path(Self::token_path()))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains(format!(
                "refresh_token={old_refresh_token}"
            )))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(Self::token_body(access_token, new_refresh_token)),
            )
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Reject any refresh attempt with the given status.
    pub async fn mount_refresh_rejected(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(Self::token_path()))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Token is not active"
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer refresh attempts with a 200 whose body violates the token
    /// response contract.
    pub async fn mount_refresh_malformed(&self) {
        Mock::given(method("POST"))
            .and(path(Self::token_path()))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "unexpected": "shape"
            })))
            .mount(&self.server)
            .await;
    }
}
