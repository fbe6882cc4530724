use crate::config::ConfigError;
use crate::handlers::{account_handler, session_handler, AppState};
use crate::middleware::policy::{self, PolicyState, PolicyTable, Requirement};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Whole-request deadline, well above the IdP client timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Policy table for the gateway's own surface.
///
/// The auth endpoints must be public; they are how a session comes to
/// exist. The admin prefix demands `ROLE_admin` as mapped from the realm
/// roles. Everything unlisted requires authentication.
fn gateway_policies() -> PolicyTable {
    PolicyTable::new(vec![
        ("/api/auth/".to_string(), Requirement::Public),
        ("/health".to_string(), Requirement::Public),
        (
            "/api/admin/".to_string(),
            Requirement::Role("ROLE_admin".to_string()),
        ),
    ])
}

pub fn build_routes(state: Arc<AppState>) -> Result<Router, ConfigError> {
    let frontend_origin = HeaderValue::from_str(&state.config.frontend_url).map_err(|e| {
        ConfigError::InvalidValue {
            name: "FRONTEND_URL".to_string(),
            reason: e.to_string(),
        }
    })?;

    // Credentialed CORS: the refresh cookie only flows cross-origin when
    // the frontend origin is named explicitly, never via a wildcard.
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let policy_state = Arc::new(PolicyState {
        verifier: state.verifier.clone(),
        policies: gateway_policies(),
    });

    Ok(Router::new()
        // Session lifecycle
        .route("/api/auth/login", get(session_handler::login))
        .route("/api/auth/callback", get(session_handler::callback))
        .route("/api/auth/refresh", post(session_handler::refresh))
        .route("/api/auth/logout", post(session_handler::logout))
        .route(
            "/api/auth/logout-redirect",
            get(session_handler::logout_redirect),
        )
        // Password reset
        .route(
            "/api/auth/password-reset/request",
            post(account_handler::reset_request),
        )
        .route(
            "/api/auth/password-reset/confirm",
            post(account_handler::reset_confirm),
        )
        // Authenticated surface
        .route("/api/me", get(account_handler::me))
        // Admin surface, role-gated by the policy table
        .route(
            "/api/admin/reset-tokens/prune",
            post(account_handler::prune_reset_tokens),
        )
        // Health check
        .route("/health", get(session_handler::health))
        .layer(middleware::from_fn_with_state(
            policy_state,
            policy::require_access,
        ))
        .layer(cors)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
