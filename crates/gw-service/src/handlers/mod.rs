//! HTTP handlers for the session lifecycle and account operations.

pub mod account_handler;
pub mod session_handler;

use crate::config::Config;
use crate::cookies::CookieSettings;
use crate::errors::GwError;
use crate::middleware::verifier::{JwksVerifier, TokenVerifier};
use crate::services::directory::{KeycloakUserDirectory, LogMailSender, MailSender, UserDirectory};
use crate::services::reset_tokens::ResetTokenStore;
use common::token_client::TokenClient;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub cookies: CookieSettings,
    pub token_client: TokenClient,
    pub verifier: Arc<dyn TokenVerifier>,
    pub reset_tokens: ResetTokenStore,
    pub directory: Arc<dyn UserDirectory>,
    pub mailer: Arc<dyn MailSender>,
}

impl AppState {
    /// Wire up the production collaborators from configuration.
    pub fn from_config(config: Config) -> Result<Self, GwError> {
        let endpoint = config.token_endpoint_config();

        let token_client = TokenClient::new(endpoint.clone()).map_err(|e| {
            tracing::error!(
                target: "gw_service::handlers",
                error = %e,
                "failed to build token client"
            );
            GwError::Internal
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.idp_timeout_secs))
            .build()
            .map_err(|e| {
                tracing::error!(
                    target: "gw_service::handlers",
                    error = %e,
                    "failed to build http client"
                );
                GwError::Internal
            })?;

        let verifier = Arc::new(JwksVerifier::new(
            http.clone(),
            endpoint.jwks_url(),
            &endpoint.issuer(),
        ));
        let directory = Arc::new(KeycloakUserDirectory::new(http, endpoint));

        Ok(Self {
            cookies: config.cookie_settings(),
            config,
            token_client,
            verifier,
            reset_tokens: ResetTokenStore::new(),
            directory,
            mailer: Arc::new(LogMailSender),
        })
    }
}
