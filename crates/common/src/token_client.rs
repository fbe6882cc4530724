//! Client for the IdP token endpoint.
//!
//! Performs the two token-acquisition protocols the gateway brokers:
//! authorization-code exchange and refresh-token exchange, both as
//! form-encoded POSTs against
//! `{idp}/realms/{realm}/protocol/openid-connect/token`.
//!
//! The client owns no state: every call is one bounded outbound request and
//! the resulting [`TokenPair`] is handed straight back to the caller. Failure
//! classification is explicit: callers switch on [`ExchangeError`] kinds,
//! never on message text.
//!
//! # Security
//!
//! - Client secret is stored as `SecretString` (never logged)
//! - Token values never appear in logs; upstream error bodies are logged at
//!   trace level only
//! - HTTP timeouts bound every request; a timeout is `UpstreamUnavailable`

use crate::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

// =============================================================================
// Constants
// =============================================================================

/// Default HTTP request timeout for token-endpoint calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout for the HTTP client.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// OAuth2 scopes requested during login-initiate.
const AUTH_SCOPES: &str = "openid profile email";

// =============================================================================
// Error Types
// =============================================================================

/// Failure classification for token-endpoint calls.
#[derive(Error, Debug, Clone)]
pub enum ExchangeError {
    /// The IdP rejected the request (non-success HTTP status).
    ///
    /// The upstream body is carried for server-side logging; it must never
    /// reach a browser response.
    #[error("identity provider rejected the request (status {status})")]
    UpstreamAuth {
        /// Upstream HTTP status code.
        status: u16,
        /// Upstream response body, for logs only.
        body: String,
    },

    /// Transport failure or timeout reaching the IdP.
    #[error("identity provider unreachable: {0}")]
    UpstreamUnavailable(String),

    /// The IdP answered 200 but the body violated the token contract.
    #[error("malformed token response from identity provider: {0}")]
    MalformedResponse(String),

    /// The client itself could not be constructed.
    #[error("token client configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the token-endpoint client.
#[derive(Clone)]
pub struct TokenEndpointConfig {
    /// IdP base URL (e.g. `https://idp.example.com`), no trailing slash.
    pub idp_base_url: String,

    /// IdP realm name.
    pub realm: String,

    /// OAuth client ID registered with the IdP.
    pub client_id: String,

    /// OAuth client secret (as `SecretString`).
    pub client_secret: SecretString,

    /// The gateway's callback URL, byte-for-byte as registered with the IdP.
    pub redirect_uri: String,

    /// HTTP request timeout.
    pub http_timeout: Duration,
}

impl fmt::Debug for TokenEndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEndpointConfig")
            .field("idp_base_url", &self.idp_base_url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl TokenEndpointConfig {
    /// Create a new configuration with the default timeout.
    #[must_use]
    pub fn new(
        idp_base_url: String,
        realm: String,
        client_id: String,
        client_secret: SecretString,
        redirect_uri: String,
    ) -> Self {
        Self {
            idp_base_url: idp_base_url.trim_end_matches('/').to_string(),
            realm,
            client_id,
            client_secret,
            redirect_uri,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Issuer URL as it appears in tokens: `{base}/realms/{realm}`.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.idp_base_url, self.realm)
    }

    /// The token endpoint for both grant types.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.issuer())
    }

    /// The JWKS endpoint serving the IdP's public verification keys.
    #[must_use]
    pub fn jwks_url(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.issuer())
    }

    /// Build the authorization redirect URL for login-initiate.
    ///
    /// The `state` value binds the browser leg of the flow; the redirect URI
    /// is the registered callback and must match the one sent during code
    /// exchange exactly.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", AUTH_SCOPES)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state)
            .finish();
        format!("{}/protocol/openid-connect/auth?{}", self.issuer(), query)
    }

    /// Build the IdP logout URL for terminating the IdP-side session.
    #[must_use]
    pub fn logout_url(&self, post_logout_redirect: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("post_logout_redirect_uri", post_logout_redirect)
            .finish();
        format!("{}/protocol/openid-connect/logout?{}", self.issuer(), query)
    }
}

// =============================================================================
// Token Pair
// =============================================================================

/// One successful token-endpoint response.
///
/// All four fields are required; the absence of any of them is a contract
/// violation surfaced as [`ExchangeError::MalformedResponse`], never silently
/// substituted. The pair lives only for the scope of the request that
/// produced it: the refresh token goes into the browser cookie and the
/// access token into the response, and nothing is persisted server-side.
#[derive(Clone, Deserialize)]
pub struct TokenPair {
    /// Opaque signed access token for the browser.
    pub access_token: String,

    /// Opaque refresh token, destined for the secure cookie.
    pub refresh_token: String,

    /// Access-token lifetime in seconds.
    pub expires_in: u64,

    /// Token type as reported by the IdP (always `Bearer` in practice).
    pub token_type: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

// =============================================================================
// Token Client
// =============================================================================

/// Stateless client for the IdP token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    config: TokenEndpointConfig,
    http: reqwest::Client,
}

impl TokenClient {
    /// Build a token client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ExchangeError::Configuration` if the HTTP client cannot be
    /// constructed.
    pub fn new(config: TokenEndpointConfig) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                ExchangeError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { config, http })
    }

    /// The configuration this client was built from.
    #[must_use]
    pub fn config(&self) -> &TokenEndpointConfig {
        &self.config
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// Posts `grant_type=authorization_code` with the registered redirect
    /// URI. The IdP rejects the exchange unless the redirect URI matches the
    /// one used during login-initiate byte-for-byte.
    ///
    /// # Errors
    ///
    /// See [`ExchangeError`] for the failure classification.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
    ) -> Result<TokenPair, ExchangeError> {
        debug!(
            target: "common.token_client",
            client_id = %self.config.client_id,
            grant_type = "authorization_code",
            "Requesting token exchange from IdP"
        );

        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", &self.config.client_id),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", &self.config.redirect_uri),
        ];

        self.request_token(&form).await
    }

    /// Exchange a refresh token for a rotated token pair.
    ///
    /// # Errors
    ///
    /// See [`ExchangeError`] for the failure classification.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ExchangeError> {
        debug!(
            target: "common.token_client",
            client_id = %self.config.client_id,
            grant_type = "refresh_token",
            "Requesting token refresh from IdP"
        );

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", &self.config.client_id),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("refresh_token", refresh_token),
        ];

        self.request_token(&form).await
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenPair, ExchangeError> {
        let response = self
            .http
            .post(self.config.token_url())
            .form(form)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "common.token_client", error = %e, "Token request transport failure");
                ExchangeError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await.map_err(|e| {
                debug!(target: "common.token_client", error = %e, "Failed to read token response body");
                ExchangeError::UpstreamUnavailable(e.to_string())
            })?;

            let pair: TokenPair = serde_json::from_slice(&body).map_err(|e| {
                warn!(
                    target: "common.token_client",
                    error = %e,
                    "Token response violated the contract"
                );
                ExchangeError::MalformedResponse(e.to_string())
            })?;

            debug!(
                target: "common.token_client",
                expires_in_secs = pair.expires_in,
                "Token acquired successfully"
            );

            Ok(pair)
        } else {
            let body = response.text().await.unwrap_or_else(|e| {
                trace!(target: "common.token_client", error = %e, "Failed to read error response body");
                "<failed to read body>".to_string()
            });
            warn!(
                target: "common.token_client",
                status = %status,
                "Token request rejected by IdP"
            );
            // Body carries user identifiers on some IdPs; trace level only
            trace!(
                target: "common.token_client",
                body = %body,
                "Token rejection response body"
            );
            Err(ExchangeError::UpstreamAuth {
                status: status.as_u16(),
                body,
            })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
