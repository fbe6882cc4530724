//! Access-token signature verification against the IdP's published key set.
//!
//! The gateway never holds signing keys of its own. Tokens are validated
//! against the JWKS document the IdP serves, keyed by the `kid` header.
//! Unknown key IDs trigger one re-fetch of the key set so key rotation at
//! the IdP does not require a gateway restart. Re-fetches are rate-limited,
//! so unverifiable tokens cannot drive unbounded upstream traffic.

use async_trait::async_trait;
use common::claims::{extract_kid, IdentityClaims};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Minimum spacing between key-set fetches. Without it, a token carrying a
/// fabricated `kid` turns every request into an upstream GET.
const REFETCH_COOLDOWN: Duration = Duration::from_secs(10);

/// Why a token failed verification.
///
/// The invalid-token variant is deliberately uniform so response bodies never
/// reveal which check failed.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("The access token is invalid or expired")]
    InvalidToken,

    #[error("Key set unavailable: {0}")]
    JwksUnavailable(String),
}

/// Verifies bearer tokens and produces the caller's identity claims.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<IdentityClaims, VerifyError>;
}

// ===== JWKS document =====

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

// ===== Verifier =====

/// [`TokenVerifier`] backed by the IdP's JWKS endpoint.
///
/// Decoding keys are cached per `kid`. RSA keys only; other key types in the
/// document are skipped.
pub struct JwksVerifier {
    http: reqwest::Client,
    jwks_url: String,
    validation: Validation,
    keys: RwLock<HashMap<String, DecodingKey>>,
    refetch_gate: Mutex<Option<FetchAttempt>>,
}

/// Outcome of the most recent key-set fetch, used to rate-limit refetches.
struct FetchAttempt {
    at: Instant,
    failed: bool,
}

impl JwksVerifier {
    pub fn new(http: reqwest::Client, jwks_url: String, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.validate_aud = false;

        Self {
            http,
            jwks_url,
            validation,
            keys: RwLock::new(HashMap::new()),
            refetch_gate: Mutex::new(None),
        }
    }

    async fn cached_key(&self, kid: &str) -> Option<DecodingKey> {
        self.keys.read().await.get(kid).cloned()
    }

    /// Fetch the key set and replace the cache wholesale.
    ///
    /// Replacing rather than merging means keys the IdP has withdrawn stop
    /// verifying on the next unknown-kid fetch. At most one fetch runs per
    /// cool-down window; the gate is held across the request so concurrent
    /// cache misses share a single fetch.
    async fn refresh_keys(&self) -> Result<(), VerifyError> {
        let mut gate = self.refetch_gate.lock().await;
        if let Some(last) = gate.as_ref() {
            if last.at.elapsed() < REFETCH_COOLDOWN {
                if last.failed {
                    return Err(VerifyError::JwksUnavailable(
                        "key set fetch backing off after a failure".to_string(),
                    ));
                }
                return Ok(());
            }
        }
        *gate = Some(FetchAttempt {
            at: Instant::now(),
            failed: true,
        });

        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| VerifyError::JwksUnavailable(e.to_string()))?;

        let document: JwksDocument = response
            .json()
            .await
            .map_err(|e| VerifyError::JwksUnavailable(format!("malformed key set: {e}")))?;

        let mut fresh = HashMap::new();
        for jwk in document.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
                continue;
            };
            if let Ok(key) = DecodingKey::from_rsa_components(&n, &e) {
                fresh.insert(kid, key);
            }
        }

        tracing::debug!(
            target: "gw_service::middleware",
            key_count = fresh.len(),
            "refreshed verification key set"
        );

        *self.keys.write().await = fresh;
        if let Some(last) = gate.as_mut() {
            last.failed = false;
        }
        Ok(())
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaims, VerifyError> {
        let kid = extract_kid(token).map_err(|_| VerifyError::InvalidToken)?;

        let key = match self.cached_key(&kid).await {
            Some(key) => key,
            None => {
                self.refresh_keys().await?;
                self.cached_key(&kid)
                    .await
                    .ok_or(VerifyError::InvalidToken)?
            }
        };

        let data = decode::<IdentityClaims>(token, &key, &self.validation).map_err(|e| {
            tracing::debug!(
                target: "gw_service::middleware",
                reason = %e,
                "token verification failed"
            );
            VerifyError::InvalidToken
        })?;

        Ok(data.claims)
    }
}
