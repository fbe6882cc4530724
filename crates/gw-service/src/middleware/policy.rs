//! Route-level access policy.
//!
//! Every request passes through the policy gate before reaching a handler.
//! The table maps path prefixes to a requirement; the first matching prefix
//! wins, and anything unmatched requires authentication. New routes are
//! therefore protected by default and must be opted into being public.

use crate::errors::GwError;
use crate::middleware::verifier::{TokenVerifier, VerifyError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use common::claims::AuthorizationFacts;
use std::sync::Arc;

/// What a route demands of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    Role(String),
}

/// Ordered prefix-to-requirement mapping.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    rules: Vec<(String, Requirement)>,
    fallback: Requirement,
}

impl PolicyTable {
    pub fn new(rules: Vec<(String, Requirement)>) -> Self {
        Self {
            rules,
            fallback: Requirement::Authenticated,
        }
    }

    /// First rule whose prefix matches the path, falling back to
    /// authenticated.
    pub fn requirement_for(&self, path: &str) -> &Requirement {
        self.rules
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix))
            .map_or(&self.fallback, |(_, requirement)| requirement)
    }
}

/// Outcome of evaluating a requirement against the caller's facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Permit,
    DenyUnauthenticated,
    DenyForbidden { required: String },
}

/// Pure policy decision.
///
/// The missing-identity check always runs before the role check, so an
/// anonymous caller to a role-gated route is told to authenticate rather
/// than told which role it lacks.
pub fn evaluate(requirement: &Requirement, facts: Option<&AuthorizationFacts>) -> AccessDecision {
    match requirement {
        Requirement::Public => AccessDecision::Permit,
        Requirement::Authenticated => match facts {
            Some(_) => AccessDecision::Permit,
            None => AccessDecision::DenyUnauthenticated,
        },
        Requirement::Role(role) => match facts {
            None => AccessDecision::DenyUnauthenticated,
            Some(facts) if facts.has_role(role) => AccessDecision::Permit,
            Some(_) => AccessDecision::DenyForbidden {
                required: role.clone(),
            },
        },
    }
}

/// State the policy gate needs, kept separate from the handler state.
#[derive(Clone)]
pub struct PolicyState {
    pub verifier: Arc<dyn TokenVerifier>,
    pub policies: PolicyTable,
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Middleware enforcing the policy table over the whole router.
///
/// On permit, the caller's [`AuthorizationFacts`] are stored in request
/// extensions for handlers that need the identity.
pub async fn require_access(
    State(state): State<Arc<PolicyState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GwError> {
    let requirement = state.policies.requirement_for(req.uri().path()).clone();

    if requirement == Requirement::Public {
        return Ok(next.run(req).await);
    }

    let token = bearer_token(&req).ok_or(GwError::Unauthenticated)?;

    let claims = state.verifier.verify(token).await.map_err(|e| match e {
        VerifyError::InvalidToken => GwError::Unauthenticated,
        VerifyError::JwksUnavailable(reason) => {
            tracing::warn!(
                target: "gw_service::middleware",
                reason = %reason,
                "could not fetch verification keys"
            );
            GwError::UpstreamUnavailable
        }
    })?;

    let facts = AuthorizationFacts::derive(claims);

    match evaluate(&requirement, Some(&facts)) {
        AccessDecision::Permit => {
            req.extensions_mut().insert(facts);
            Ok(next.run(req).await)
        }
        AccessDecision::DenyUnauthenticated => Err(GwError::Unauthenticated),
        AccessDecision::DenyForbidden { required } => Err(GwError::Forbidden {
            required,
            provided: facts.role_set().iter().cloned().collect(),
        }),
    }
}
