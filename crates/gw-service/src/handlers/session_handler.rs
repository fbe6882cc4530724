//! Session lifecycle: login redirect, IdP callback, refresh rotation, logout.
//!
//! The callback hands the access token to the frontend in the URL fragment.
//! Fragments are never sent to servers, so the token cannot end up in access
//! logs or Referer headers the way a query parameter would.

use crate::cookies;
use crate::errors::GwError;
use crate::handlers::AppState;
use crate::models::{AccessTokenResponse, CallbackParams, HealthResponse, MessageResponse};
use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use axum_extra::extract::CookieJar;
use common::token_client::{ExchangeError, TokenPair};
use std::sync::Arc;
use uuid::Uuid;

/// Failure categories surfaced to the frontend after a failed callback.
///
/// Deliberately coarse; the browser never sees upstream detail.
const FAILURE_STATE_MISMATCH: &str = "state_mismatch";
const FAILURE_IDP_ERROR: &str = "idp_error";
const FAILURE_EXCHANGE: &str = "exchange_failed";

fn fragment_redirect(frontend_url: &str, pairs: &[(&str, &str)]) -> Redirect {
    let fragment = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    Redirect::to(&format!("{frontend_url}#{fragment}"))
}

fn failure_redirect(frontend_url: &str, category: &str) -> Redirect {
    fragment_redirect(
        frontend_url,
        &[
            ("error", "authentication_failed"),
            ("error_description", category),
        ],
    )
}

fn success_redirect(frontend_url: &str, pair: &TokenPair) -> Redirect {
    fragment_redirect(
        frontend_url,
        &[
            ("access_token", &pair.access_token),
            ("expires_in", &pair.expires_in.to_string()),
            ("token_type", "Bearer"),
        ],
    )
}

/// Handle login initiation
///
/// GET /api/auth/login
///
/// Mints a fresh state value, binds it to the browser via a short-lived
/// cookie, and redirects to the IdP's authorization endpoint.
pub async fn login(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let auth_state = Uuid::new_v4().to_string();
    let url = state.token_client.config().authorization_url(&auth_state);

    tracing::info!(
        target: "gw_service::handlers",
        "redirecting browser to identity provider for login"
    );

    (
        jar.add(cookies::state_cookie(&auth_state, &state.cookies)),
        Redirect::to(&url),
    )
}

/// Handle the IdP redirect back after the user authenticated
///
/// GET /api/auth/callback
///
/// Every outcome redirects to the frontend; errors travel as a coarse
/// category in the fragment. The state cookie is consumed either way.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let frontend = &state.config.frontend_url;
    let expected_state = cookies::extract_state(&jar);
    let jar = jar.add(cookies::clear_state_cookie(&state.cookies));

    if let Some(error) = params.error {
        tracing::warn!(
            target: "gw_service::handlers",
            error = %error,
            "identity provider reported a login failure"
        );
        return (jar, failure_redirect(frontend, FAILURE_IDP_ERROR));
    }

    let bound = match (&expected_state, &params.state) {
        (Some(expected), Some(received)) => expected == received,
        _ => false,
    };
    if !bound {
        tracing::warn!(
            target: "gw_service::handlers",
            "callback state does not match the pending login"
        );
        return (jar, failure_redirect(frontend, FAILURE_STATE_MISMATCH));
    }

    let Some(code) = params.code else {
        tracing::warn!(
            target: "gw_service::handlers",
            "callback arrived without an authorization code"
        );
        return (jar, failure_redirect(frontend, FAILURE_IDP_ERROR));
    };

    match state.token_client.exchange_authorization_code(&code).await {
        Ok(pair) => {
            tracing::info!(
                target: "gw_service::handlers",
                "authorization code exchanged, session established"
            );
            let jar = jar.add(cookies::refresh_cookie(&pair.refresh_token, &state.cookies));
            (jar, success_redirect(frontend, &pair))
        }
        Err(e) => {
            tracing::warn!(
                target: "gw_service::handlers",
                error = %e,
                "authorization code exchange failed"
            );
            (jar, failure_redirect(frontend, FAILURE_EXCHANGE))
        }
    }
}

/// Handle access token refresh
///
/// POST /api/auth/refresh
///
/// Rotates the refresh cookie on success. The cookie is cleared only when
/// the IdP positively rejected the token; transport failures and contract
/// violations leave it untouched so the session survives an IdP outage.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AccessTokenResponse>), (CookieJar, GwError)> {
    let Some(refresh_token) = cookies::extract_refresh_token(&jar) else {
        return Err((jar, GwError::NoRefreshToken));
    };

    match state.token_client.refresh(&refresh_token).await {
        Ok(pair) => {
            tracing::debug!(
                target: "gw_service::handlers",
                expires_in = pair.expires_in,
                "access token refreshed"
            );
            let jar = jar.add(cookies::refresh_cookie(&pair.refresh_token, &state.cookies));
            Ok((
                jar,
                Json(AccessTokenResponse {
                    access_token: pair.access_token,
                    expires_in: pair.expires_in,
                    token_type: pair.token_type,
                }),
            ))
        }
        // A 5xx from the token endpoint is an outage, not a verdict on the
        // token; only 4xx rejections end the session.
        Err(ExchangeError::UpstreamAuth { status, .. }) if status >= 500 => {
            tracing::warn!(
                target: "gw_service::handlers",
                status,
                "identity provider errored during refresh"
            );
            Err((jar, GwError::UpstreamUnavailable))
        }
        Err(ExchangeError::UpstreamAuth { status, .. }) => {
            tracing::info!(
                target: "gw_service::handlers",
                status,
                "refresh token rejected by identity provider"
            );
            let jar = jar.add(cookies::clear_refresh_cookie(&state.cookies));
            Err((jar, GwError::RefreshExpired))
        }
        Err(ExchangeError::UpstreamUnavailable(reason)) => {
            tracing::warn!(
                target: "gw_service::handlers",
                reason = %reason,
                "identity provider unreachable during refresh"
            );
            Err((jar, GwError::UpstreamUnavailable))
        }
        Err(ExchangeError::MalformedResponse(reason)) => {
            tracing::warn!(
                target: "gw_service::handlers",
                reason = %reason,
                "identity provider returned a malformed refresh response"
            );
            Err((jar, GwError::MalformedUpstream))
        }
        Err(ExchangeError::Configuration(reason)) => {
            tracing::error!(
                target: "gw_service::handlers",
                reason = %reason,
                "token client misconfigured"
            );
            Err((jar, GwError::Internal))
        }
    }
}

/// Handle logout
///
/// POST /api/auth/logout
///
/// Clears the refresh cookie. Safe to call without a session.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    tracing::info!(target: "gw_service::handlers", "session logged out");
    (
        jar.add(cookies::clear_refresh_cookie(&state.cookies)),
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

/// Handle logout with IdP session termination
///
/// GET /api/auth/logout-redirect
///
/// Clears the refresh cookie and sends the browser to the IdP's logout
/// endpoint so the IdP-side session ends too.
pub async fn logout_redirect(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let url = state
        .token_client
        .config()
        .logout_url(&state.config.frontend_url);

    tracing::info!(
        target: "gw_service::handlers",
        "session logged out, redirecting to identity provider logout"
    );

    (
        jar.add(cookies::clear_refresh_cookie(&state.cookies)),
        Redirect::to(&url),
    )
}

/// Health check
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "identity-gateway".to_string(),
    })
}
