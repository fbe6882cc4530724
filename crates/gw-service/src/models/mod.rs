use common::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Access token handed to the frontend after a successful refresh.
///
/// Mirrors the OAuth 2.0 token response minus the refresh token, which never
/// appears in a response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

/// Generic acknowledgement body for operations with no payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Result of an admin prune of pending reset tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneResponse {
    pub pruned: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Query parameters the IdP appends when redirecting back to the callback.
///
/// `code`/`state` on success, `error`/`error_description` when the user
/// cancelled or the IdP rejected the request.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Body for the password reset initiation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Body for the password reset confirmation endpoint.
#[derive(Deserialize)]
pub struct ResetConfirm {
    pub token: String,
    pub new_password: SecretString,
}

impl std::fmt::Debug for ResetConfirm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetConfirm")
            .field("token", &"[REDACTED]")
            .field("new_password", &"[REDACTED]")
            .finish()
    }
}

/// Identity summary returned by the whoami endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub subject: String,
    pub roles: BTreeSet<String>,
}
