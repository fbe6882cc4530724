//! Identity-provider claims and the authorization facts derived from them.
//!
//! The gateway never mints tokens; it interprets claims inside tokens signed
//! by the external IdP. This module provides:
//! - Size limits for DoS prevention on inbound bearer tokens
//! - Key ID extraction from token headers (for JWKS key lookup)
//! - The typed claim structures (`IdentityClaims`) parsed once at the trust
//!   boundary, with a "missing or malformed substructure = empty" policy
//! - `AuthorizationFacts` derivation: realm-level and per-client roles are
//!   flattened into one prefixed role set
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Signature, issuer, and expiry verification happen elsewhere; nothing in
//!   this module trusts a token by itself
//! - The `sub` field is redacted in Debug output

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed bearer-token size in bytes (8KB).
///
/// Typical IdP access tokens are well under 4KB even with many roles. Tokens
/// larger than this are rejected before any base64 or JSON work happens.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Prefix applied to every role name taken from the IdP claims.
///
/// Both realm-level and per-client roles get the same prefix, so policy rules
/// are written against one uniform namespace (`ROLE_admin`, `ROLE_user`, ...).
pub const ROLE_PREFIX: &str = "ROLE_";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while reading a token's structure.
///
/// Messages are intentionally generic; detail is logged at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not a structurally valid JWT.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header is missing the `kid` field.
    #[error("The access token is invalid or expired")]
    MissingKid,
}

// =============================================================================
// Claim Structures
// =============================================================================

/// Realm-level role container (`realm_access` claim).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RealmAccess {
    /// Role names granted at the realm level.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Per-client role container (one value of the `resource_access` claim).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientAccess {
    /// Role names granted for this client/resource.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims carried by a verified identity token.
///
/// Parsed exactly once at the trust boundary. The nested role structures are
/// deserialized leniently: an absent or malformed `realm_access` /
/// `resource_access` substructure becomes empty instead of failing the whole
/// token, matching how the IdP omits them for role-less users.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (stable user identifier) - redacted in Debug output.
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default)]
    pub iat: i64,

    /// Preferred username, if the IdP includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Email address, if the IdP includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Realm-level roles.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RealmAccess>,

    /// Per-client roles, keyed by client/resource identifier.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub resource_access: Option<BTreeMap<String, ClientAccess>>,
}

impl fmt::Debug for IdentityClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityClaims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("preferred_username", &self.preferred_username)
            .field("realm_access", &self.realm_access)
            .field("resource_access", &self.resource_access)
            .finish_non_exhaustive()
    }
}

/// Deserialize a substructure, mapping any shape mismatch to `None`.
///
/// The IdP contract for role containers is advisory; role-less tokens omit
/// them and older realms have shipped them in odd shapes. Either way the
/// correct reading is "no roles", never a rejected token.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

// =============================================================================
// Authorization Facts
// =============================================================================

/// Authorization facts derived from one verified token.
///
/// Derived fresh on every request and discarded at end of request; never
/// cached, never mutated. Derivation is deterministic: the same claims always
/// produce the same facts regardless of key ordering in the source token.
#[derive(Clone)]
pub struct AuthorizationFacts {
    subject_id: String,
    role_set: BTreeSet<String>,
    claims: IdentityClaims,
}

impl AuthorizationFacts {
    /// Derive facts from verified claims.
    ///
    /// Realm roles and every client's resource roles are flattened into one
    /// set, each entry prefixed with [`ROLE_PREFIX`].
    #[must_use]
    pub fn derive(claims: IdentityClaims) -> Self {
        let mut role_set = BTreeSet::new();

        if let Some(realm) = &claims.realm_access {
            for role in &realm.roles {
                role_set.insert(format!("{ROLE_PREFIX}{role}"));
            }
        }

        if let Some(resources) = &claims.resource_access {
            for client_access in resources.values() {
                for role in &client_access.roles {
                    role_set.insert(format!("{ROLE_PREFIX}{role}"));
                }
            }
        }

        Self {
            subject_id: claims.sub.clone(),
            role_set,
            claims,
        }
    }

    /// Stable subject identifier from the token's `sub` claim.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// The flattened, prefixed role set.
    #[must_use]
    pub fn role_set(&self) -> &BTreeSet<String> {
        &self.role_set
    }

    /// Check whether a prefixed role (e.g. `ROLE_admin`) is present.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role_set.contains(role)
    }

    /// Read-only access to the raw claims the facts were derived from.
    #[must_use]
    pub fn claims(&self) -> &IdentityClaims {
        &self.claims
    }
}

impl fmt::Debug for AuthorizationFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationFacts")
            .field("subject_id", &"[REDACTED]")
            .field("role_set", &self.role_set)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// Used to pick the right IdP public key from the JWKS document before
/// verification. The token MUST still be verified after the key lookup; the
/// `kid` value is only trusted as an index into a trusted key set.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_TOKEN_SIZE_BYTES`]
/// - `MalformedToken` - not three dot-separated parts, bad base64, or bad JSON
/// - `MissingKid` - header has no non-empty string `kid`
pub fn extract_kid(token: &str) -> Result<String, ClaimsError> {
    // Size check first, before any decoding work
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "common.claims",
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(ClaimsError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.claims",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(ClaimsError::MalformedToken);
    }

    let header_part = parts.first().ok_or(ClaimsError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.claims", error = %e, "Failed to decode JWT header base64");
        ClaimsError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.claims", error = %e, "Failed to parse JWT header JSON");
        ClaimsError::MalformedToken
    })?;

    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(ClaimsError::MissingKid)?;

    Ok(kid)
}

// =============================================================================
// Tests
// =============================================================================
