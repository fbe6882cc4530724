//! User directory backed by the IdP's admin API, plus the outbound mail seam.
//!
//! Password resets need two things the browser-facing OAuth surface does not
//! offer: looking a user up by email and writing a new credential. Both go
//! through the IdP's admin REST API, authenticated with a client-credentials
//! token the gateway caches until shortly before expiry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::secret::{ExposeSecret, SecretString};
use common::token_client::TokenEndpointConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// Renew the cached admin token this long before it actually expires.
const TOKEN_RENEWAL_LEEWAY_SECS: i64 = 30;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("User directory unreachable: {0}")]
    Unavailable(String),

    #[error("User directory rejected the request: status {0}")]
    Rejected(u16),

    #[error("User directory returned a malformed response: {0}")]
    Malformed(String),
}

/// Lookup and credential operations the reset flow needs.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve an email address to a subject ID, if the user exists.
    async fn find_subject_by_email(&self, email: &str) -> Result<Option<String>, DirectoryError>;

    /// Replace the user's password with a permanent credential.
    async fn set_password(
        &self,
        subject_id: &str,
        new_password: &SecretString,
    ) -> Result<(), DirectoryError>;
}

/// Outbound mail seam for reset notifications.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_reset_email(&self, email: &str, reset_token: &str);
}

/// [`MailSender`] that records the event instead of sending mail.
///
/// The reset token is the credential being delivered, so it is never
/// written to the log even here.
#[derive(Debug, Clone, Default)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send_reset_email(&self, email: &str, _reset_token: &str) {
        tracing::info!(
            target: "gw_service::services",
            email = %email,
            "password reset email requested"
        );
    }
}

// ===== IdP admin API types =====

#[derive(Debug, Deserialize)]
struct AdminTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct UserRepresentation {
    id: String,
}

#[derive(Debug, Serialize)]
struct CredentialRepresentation<'a> {
    #[serde(rename = "type")]
    credential_type: &'static str,
    value: &'a str,
    temporary: bool,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// [`UserDirectory`] over the Keycloak-style admin REST API.
pub struct KeycloakUserDirectory {
    http: reqwest::Client,
    config: TokenEndpointConfig,
    admin_token: Mutex<Option<CachedToken>>,
}

impl KeycloakUserDirectory {
    pub fn new(http: reqwest::Client, config: TokenEndpointConfig) -> Self {
        Self {
            http,
            config,
            admin_token: Mutex::new(None),
        }
    }

    fn users_url(&self) -> String {
        format!(
            "{}/admin/realms/{}/users",
            self.config.idp_base_url, self.config.realm
        )
    }

    /// Current admin token, renewing via client credentials when the cached
    /// one is absent or about to expire.
    ///
    /// The lock is held across the renewal request, so concurrent callers
    /// share one grant instead of racing to issue their own.
    async fn admin_token(&self) -> Result<String, DirectoryError> {
        let mut cached = self.admin_token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Utc::now() + Duration::seconds(TOKEN_RENEWAL_LEEWAY_SECS) < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        let response = self
            .http
            .post(self.config.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", &self.config.client_id),
                ("client_secret", self.config.client_secret.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Rejected(response.status().as_u16()));
        }

        let body: AdminTokenResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))?;

        let expires_at = Utc::now() + Duration::seconds(body.expires_in);
        *cached = Some(CachedToken {
            token: body.access_token.clone(),
            expires_at,
        });

        Ok(body.access_token)
    }
}

#[async_trait]
impl UserDirectory for KeycloakUserDirectory {
    async fn find_subject_by_email(&self, email: &str) -> Result<Option<String>, DirectoryError> {
        let token = self.admin_token().await?;

        let response = self
            .http
            .get(self.users_url())
            .query(&[("email", email), ("exact", "true")])
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Rejected(response.status().as_u16()));
        }

        let users: Vec<UserRepresentation> = response
            .json()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))?;

        Ok(users.into_iter().next().map(|u| u.id))
    }

    async fn set_password(
        &self,
        subject_id: &str,
        new_password: &SecretString,
    ) -> Result<(), DirectoryError> {
        let token = self.admin_token().await?;

        let response = self
            .http
            .put(format!("{}/{subject_id}/reset-password", self.users_url()))
            .bearer_auth(&token)
            .json(&CredentialRepresentation {
                credential_type: "password",
                value: new_password.expose_secret(),
                temporary: false,
            })
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Rejected(response.status().as_u16()));
        }

        tracing::info!(
            target: "gw_service::services",
            subject_id = %subject_id,
            "password updated via directory"
        );

        Ok(())
    }
}
