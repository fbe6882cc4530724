//! Account endpoints: identity introspection and password reset.

use crate::errors::GwError;
use crate::handlers::AppState;
use crate::models::{MeResponse, MessageResponse, PruneResponse, ResetConfirm, ResetRequest};
use crate::services::directory::DirectoryError;
use axum::{extract::State, Extension, Json};
use common::claims::AuthorizationFacts;
use std::sync::Arc;

/// Acknowledgement for reset initiation, identical whether or not the
/// account exists.
const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a reset link has been sent";

/// Handle identity introspection
///
/// GET /api/me
///
/// The policy gate has already verified the token and stored the caller's
/// facts in request extensions.
pub async fn me(Extension(facts): Extension<AuthorizationFacts>) -> Json<MeResponse> {
    Json(MeResponse {
        subject: facts.subject_id().to_string(),
        roles: facts.role_set().clone(),
    })
}

/// Handle reset-token housekeeping
///
/// POST /api/admin/reset-tokens/prune
///
/// Gated on `ROLE_admin` by the policy table. Drops expired pending resets
/// and reports how many were removed.
pub async fn prune_reset_tokens(State(state): State<Arc<AppState>>) -> Json<PruneResponse> {
    let pruned = state.reset_tokens.prune_expired();
    if pruned > 0 {
        tracing::info!(
            target: "gw_service::handlers",
            pruned,
            "dropped expired password reset tokens"
        );
    }
    Json(PruneResponse { pruned })
}

/// Handle password reset initiation
///
/// POST /api/auth/password-reset/request
///
/// Always answers 200 with the same body. Lookup failures are logged and
/// swallowed; a different answer for unknown emails would let callers probe
/// which accounts exist.
pub async fn reset_request(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetRequest>,
) -> Json<MessageResponse> {
    match state.directory.find_subject_by_email(&request.email).await {
        Ok(Some(subject_id)) => {
            let token = state.reset_tokens.issue(&subject_id);
            state.mailer.send_reset_email(&request.email, &token).await;
        }
        Ok(None) => {
            tracing::info!(
                target: "gw_service::handlers",
                "password reset requested for unknown email"
            );
        }
        Err(e) => {
            tracing::warn!(
                target: "gw_service::handlers",
                error = %e,
                "directory lookup failed during password reset"
            );
        }
    }

    Json(MessageResponse {
        message: RESET_REQUESTED_MESSAGE.to_string(),
    })
}

/// Handle password reset confirmation
///
/// POST /api/auth/password-reset/confirm
pub async fn reset_confirm(
    State(state): State<Arc<AppState>>,
    Json(confirm): Json<ResetConfirm>,
) -> Result<Json<MessageResponse>, GwError> {
    let Some(subject_id) = state.reset_tokens.consume(&confirm.token) else {
        return Err(GwError::InvalidRequest(
            "Invalid or expired reset token".to_string(),
        ));
    };

    state
        .directory
        .set_password(&subject_id, &confirm.new_password)
        .await
        .map_err(|e| match e {
            DirectoryError::Unavailable(reason) => {
                tracing::warn!(
                    target: "gw_service::handlers",
                    reason = %reason,
                    "directory unreachable during password update"
                );
                GwError::UpstreamUnavailable
            }
            DirectoryError::Malformed(reason) => {
                tracing::warn!(
                    target: "gw_service::handlers",
                    reason = %reason,
                    "directory returned a malformed response during password update"
                );
                GwError::MalformedUpstream
            }
            DirectoryError::Rejected(status) => {
                tracing::error!(
                    target: "gw_service::handlers",
                    status,
                    "directory rejected the password update"
                );
                GwError::Internal
            }
        })?;

    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}
