//! Health endpoint tests.

use gw_test_utils::{MockIdp, TestGateway};
use reqwest::StatusCode;

#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = TestGateway::client()
        .get(format!("{}/health", gateway.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "identity-gateway");

    Ok(())
}

#[tokio::test]
async fn test_health_does_not_require_authentication() -> Result<(), anyhow::Error> {
    // Gateway pointed at a dead IdP still answers its liveness probe
    let gateway = TestGateway::spawn("http://127.0.0.1:1").await?;

    let response = TestGateway::client()
        .get(format!("{}/health", gateway.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
