use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Gateway-surface errors.
///
/// Upstream failures (`ExchangeError`) are translated into these by the
/// session handlers, the only layer allowed to turn an IdP outcome
/// into HTTP behavior. Raw upstream bodies never appear in responses.
#[derive(Debug, Error)]
pub enum GwError {
    #[error("No refresh token found")]
    NoRefreshToken,

    #[error("Refresh token expired")]
    RefreshExpired,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient role: required {required}, provided {provided:?}")]
    Forbidden {
        required: String,
        provided: Vec<String>,
    },

    #[error("Identity provider unavailable")]
    UpstreamUnavailable,

    #[error("Identity provider returned a malformed response")]
    MalformedUpstream,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provided_roles: Option<Vec<String>>,
}

impl IntoResponse for GwError {
    fn into_response(self) -> Response {
        let (status, code, message, required_role, provided_roles) = match &self {
            GwError::NoRefreshToken => (
                StatusCode::UNAUTHORIZED,
                "NO_REFRESH_TOKEN",
                "No refresh token found".to_string(),
                None,
                None,
            ),
            GwError::RefreshExpired => (
                StatusCode::UNAUTHORIZED,
                "REFRESH_EXPIRED",
                "Refresh token expired".to_string(),
                None,
                None,
            ),
            GwError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Authentication required".to_string(),
                None,
                None,
            ),
            GwError::Forbidden { required, provided } => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                format!("Requires role: {required}"),
                Some(required.clone()),
                Some(provided.clone()),
            ),
            GwError::UpstreamUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "IDP_UNAVAILABLE",
                "The identity provider is temporarily unavailable".to_string(),
                None,
                None,
            ),
            GwError::MalformedUpstream => (
                StatusCode::BAD_GATEWAY,
                "IDP_CONTRACT_VIOLATION",
                "The identity provider returned an unexpected response".to_string(),
                None,
                None,
            ),
            GwError::InvalidRequest(reason) => (
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST",
                reason.clone(),
                None,
                None,
            ),
            GwError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
                None,
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                required_role,
                provided_roles,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
