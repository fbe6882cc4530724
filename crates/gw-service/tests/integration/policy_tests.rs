//! Policy gate tests over the authenticated surface.

use gw_test_utils::token_builders::{
    expired_access_token, signed_access_token, unknown_key_token,
};
use gw_test_utils::{MockIdp, TestGateway};
use reqwest::StatusCode;

async fn get_me(
    gateway: &TestGateway,
    token: Option<&str>,
) -> Result<reqwest::Response, anyhow::Error> {
    let mut request = TestGateway::client().get(format!("{}/api/me", gateway.url()));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    Ok(request.send().await?)
}

#[tokio::test]
async fn test_me_returns_subject_and_prefixed_roles() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let token = signed_access_token(&idp.issuer(), "user-1", &["admin", "user"], 300);
    let response = get_me(&gateway, Some(&token)).await?;

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["subject"], "user-1");
    let roles: Vec<String> = serde_json::from_value(body["roles"].clone())?;
    assert!(roles.contains(&"ROLE_admin".to_string()));
    assert!(roles.contains(&"ROLE_user".to_string()));

    Ok(())
}

#[tokio::test]
async fn test_me_without_token_is_unauthenticated() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = get_me(&gateway, None).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");

    Ok(())
}

#[tokio::test]
async fn test_me_with_expired_token_rejected() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let token = expired_access_token(&idp.issuer(), "user-1");
    let response = get_me(&gateway, Some(&token)).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_me_with_unknown_signing_key_rejected() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let token = unknown_key_token(&idp.issuer(), "user-1");
    let response = get_me(&gateway, Some(&token)).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_me_with_garbage_token_rejected() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = get_me(&gateway, Some("not-a-jwt")).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

async fn prune_tokens(
    gateway: &TestGateway,
    token: Option<&str>,
) -> Result<reqwest::Response, anyhow::Error> {
    let mut request =
        TestGateway::client().post(format!("{}/api/admin/reset-tokens/prune", gateway.url()));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    Ok(request.send().await?)
}

#[tokio::test]
async fn test_admin_route_permits_admin_role() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let token = signed_access_token(&idp.issuer(), "ops-1", &["admin"], 300);
    let response = prune_tokens(&gateway, Some(&token)).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["pruned"], 0);

    Ok(())
}

#[tokio::test]
async fn test_admin_route_forbidden_without_role() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let token = signed_access_token(&idp.issuer(), "user-1", &["user"], 300);
    let response = prune_tokens(&gateway, Some(&token)).await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(body["error"]["required_role"], "ROLE_admin");
    let provided: Vec<String> = serde_json::from_value(body["error"]["provided_roles"].clone())?;
    assert!(provided.contains(&"ROLE_user".to_string()));

    Ok(())
}

#[tokio::test]
async fn test_admin_route_without_token_unauthenticated() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = prune_tokens(&gateway, None).await?;

    // Anonymous callers are told to authenticate, not which role they lack
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_requires_authentication() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    // No such route exists, but the policy gate answers before routing
    let response = TestGateway::client()
        .get(format!("{}/api/unmapped", gateway.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_auth_endpoints_are_public() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    // No bearer token on a login request
    let response = TestGateway::client()
        .get(format!("{}/api/auth/login", gateway.url()))
        .send()
        .await?;

    assert!(response.status().is_redirection());

    Ok(())
}
