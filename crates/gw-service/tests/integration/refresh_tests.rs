//! Refresh rotation and failure-mode tests.
//!
//! The load-bearing invariants: every successful refresh rotates the cookie,
//! a rejected token clears it, and transport or contract failures leave it
//! untouched.

use gw_service::cookies::REFRESH_COOKIE_NAME;
use gw_test_utils::server_harness::set_cookie_value;
use gw_test_utils::{MockIdp, TestGateway};
use reqwest::header::COOKIE;
use reqwest::StatusCode;

async fn post_refresh(
    gateway: &TestGateway,
    refresh_token: Option<&str>,
) -> Result<reqwest::Response, anyhow::Error> {
    let mut request = TestGateway::client().post(format!("{}/api/auth/refresh", gateway.url()));
    if let Some(token) = refresh_token {
        request = request.header(COOKIE, format!("{REFRESH_COOKIE_NAME}={token}"));
    }
    Ok(request.send().await?)
}

#[tokio::test]
async fn test_refresh_without_cookie_returns_401() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = post_refresh(&gateway, None).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // No cookie mutation when there was nothing to clear
    assert!(set_cookie_value(&response, REFRESH_COOKIE_NAME).is_none());

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "NO_REFRESH_TOKEN");

    Ok(())
}

#[tokio::test]
async fn test_refresh_rotates_cookie_and_returns_access_token() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    idp.mount_refresh_rotation("R1", "AT1", "R2").await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = post_refresh(&gateway, Some("R1")).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        set_cookie_value(&response, REFRESH_COOKIE_NAME).as_deref(),
        Some("R2")
    );

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["access_token"], "AT1");
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 300);
    // The refresh token never appears in a response body
    assert!(body.get("refresh_token").is_none());

    Ok(())
}

#[tokio::test]
async fn test_replayed_refresh_token_ends_session() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    idp.mount_refresh_rotation_once("R1", "AT1", "R2").await;
    idp.mount_refresh_rotation_once("R2", "AT2", "R3").await;
    idp.mount_refresh_rejected(400).await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    // First use of R1 rotates to R2
    let first = post_refresh(&gateway, Some("R1")).await?;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(
        set_cookie_value(&first, REFRESH_COOKIE_NAME).as_deref(),
        Some("R2")
    );

    // Replaying R1 is rejected and the cookie is cleared
    let replay = post_refresh(&gateway, Some("R1")).await?;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        set_cookie_value(&replay, REFRESH_COOKIE_NAME).as_deref(),
        Some("")
    );
    let body: serde_json::Value = replay.json().await?;
    assert_eq!(body["error"]["code"], "REFRESH_EXPIRED");

    // The rotated token R2 still works
    let second = post_refresh(&gateway, Some("R2")).await?;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        set_cookie_value(&second, REFRESH_COOKIE_NAME).as_deref(),
        Some("R3")
    );

    Ok(())
}

#[tokio::test]
async fn test_idp_unreachable_keeps_cookie() -> Result<(), anyhow::Error> {
    // Port 1 refuses connections
    let gateway = TestGateway::spawn("http://127.0.0.1:1").await?;

    let response = post_refresh(&gateway, Some("R1")).await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(set_cookie_value(&response, REFRESH_COOKIE_NAME).is_none());

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "IDP_UNAVAILABLE");

    Ok(())
}

#[tokio::test]
async fn test_idp_server_error_keeps_cookie() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    idp.mount_refresh_rejected(502).await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = post_refresh(&gateway, Some("R1")).await?;

    // An erroring IdP is an outage, not a rejected token
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(set_cookie_value(&response, REFRESH_COOKIE_NAME).is_none());

    Ok(())
}

#[tokio::test]
async fn test_malformed_idp_response_keeps_cookie() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    idp.mount_refresh_malformed().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = post_refresh(&gateway, Some("R1")).await?;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(set_cookie_value(&response, REFRESH_COOKIE_NAME).is_none());

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "IDP_CONTRACT_VIOLATION");

    Ok(())
}

#[tokio::test]
async fn test_refresh_cookie_is_http_only_and_path_restricted() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    idp.mount_refresh_rotation("R1", "AT1", "R2").await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = post_refresh(&gateway, Some("R1")).await?;

    let raw = response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find(|h| h.starts_with(REFRESH_COOKIE_NAME))
        .map(str::to_string)
        .expect("refresh cookie must be set");

    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("SameSite=Strict"));
    assert!(raw.contains("Path=/api/auth/refresh"));

    Ok(())
}
