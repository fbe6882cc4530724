use common::secret::SecretString;
use common::token_client::TokenEndpointConfig;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::cookies::CookieSettings;

/// Default lifetime of the refresh-token cookie (30 days).
pub const DEFAULT_REFRESH_COOKIE_MAX_AGE_SECS: i64 = 2_592_000;

/// Default timeout for outbound IdP requests.
pub const DEFAULT_IDP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub idp_base_url: String,
    pub idp_realm: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Callback URL registered with the IdP; must match the redirect used
    /// during login-initiate byte-for-byte or code exchange is rejected.
    pub redirect_uri: String,
    /// Front-end origin that receives post-login redirects and CORS access.
    pub frontend_url: String,
    pub cookie_domain: String,
    pub cookie_secure: bool,
    pub refresh_cookie_max_age_secs: i64,
    pub idp_timeout_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let idp_base_url = require(vars, "IDP_BASE_URL")?;
        let idp_realm = require(vars, "IDP_REALM")?;
        let client_id = require(vars, "IDP_CLIENT_ID")?;
        let client_secret = SecretString::from(require(vars, "IDP_CLIENT_SECRET")?);

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8083".to_string());

        let redirect_uri = vars
            .get("GW_REDIRECT_URI")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8083/api/auth/callback".to_string());

        let frontend_url = vars
            .get("FRONTEND_URL")
            .cloned()
            .unwrap_or_else(|| "http://localhost:5173".to_string());

        let cookie_domain = vars
            .get("COOKIE_DOMAIN")
            .cloned()
            .unwrap_or_else(|| "localhost".to_string());

        let cookie_secure = parse_or(vars, "COOKIE_SECURE", false)?;
        let refresh_cookie_max_age_secs = parse_or(
            vars,
            "REFRESH_COOKIE_MAX_AGE_SECS",
            DEFAULT_REFRESH_COOKIE_MAX_AGE_SECS,
        )?;
        let idp_timeout_secs = parse_or(vars, "IDP_TIMEOUT_SECS", DEFAULT_IDP_TIMEOUT_SECS)?;

        if refresh_cookie_max_age_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                name: "REFRESH_COOKIE_MAX_AGE_SECS".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(Config {
            bind_address,
            idp_base_url,
            idp_realm,
            client_id,
            client_secret,
            redirect_uri,
            frontend_url,
            cookie_domain,
            cookie_secure,
            refresh_cookie_max_age_secs,
            idp_timeout_secs,
        })
    }

    /// Configuration for the token-endpoint client, derived from this config.
    pub fn token_endpoint_config(&self) -> TokenEndpointConfig {
        TokenEndpointConfig::new(
            self.idp_base_url.clone(),
            self.idp_realm.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
            self.redirect_uri.clone(),
        )
        .with_http_timeout(Duration::from_secs(self.idp_timeout_secs))
    }

    /// Cookie flags and lifetimes, derived from this config.
    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            domain: self.cookie_domain.clone(),
            secure: self.cookie_secure,
            refresh_max_age_secs: self.refresh_cookie_max_age_secs,
        }
    }
}

fn require(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_or<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}
