//! Login initiation and IdP callback tests.

use gw_service::cookies::{REFRESH_COOKIE_NAME, STATE_COOKIE_NAME};
use gw_test_utils::server_harness::set_cookie_value;
use gw_test_utils::{MockIdp, TestGateway};
use reqwest::header::COOKIE;
use reqwest::StatusCode;

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Drive the login endpoint and return the state value plus its cookie.
async fn initiate_login(gateway: &TestGateway) -> Result<(String, String), anyhow::Error> {
    let response = TestGateway::client()
        .get(format!("{}/api/auth/login", gateway.url()))
        .send()
        .await?;

    assert!(response.status().is_redirection());

    let state_cookie = set_cookie_value(&response, STATE_COOKIE_NAME)
        .ok_or_else(|| anyhow::anyhow!("login did not set a state cookie"))?;

    let url = url::Url::parse(&location(&response))?;
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .ok_or_else(|| anyhow::anyhow!("authorization URL missing state"))?;

    Ok((state, state_cookie))
}

#[tokio::test]
async fn test_login_redirects_to_authorization_endpoint() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = TestGateway::client()
        .get(format!("{}/api/auth/login", gateway.url()))
        .send()
        .await?;

    assert!(response.status().is_redirection());

    let url = url::Url::parse(&location(&response))?;
    assert!(url.path().ends_with("/protocol/openid-connect/auth"));

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
    assert!(pairs.contains(&("client_id".to_string(), "gateway".to_string())));
    assert!(pairs.iter().any(|(k, _)| k == "state"));

    Ok(())
}

#[tokio::test]
async fn test_login_state_matches_cookie() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let (state, state_cookie) = initiate_login(&gateway).await?;
    assert_eq!(state, state_cookie);

    Ok(())
}

#[tokio::test]
async fn test_callback_success_sets_refresh_cookie_and_fragment() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    idp.mount_exchange_success("AT1", "R1").await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let (state, state_cookie) = initiate_login(&gateway).await?;

    let response = TestGateway::client()
        .get(format!(
            "{}/api/auth/callback?code=auth-code&state={state}",
            gateway.url()
        ))
        .header(COOKIE, format!("{STATE_COOKIE_NAME}={state_cookie}"))
        .send()
        .await?;

    assert!(response.status().is_redirection());

    // Token travels in the fragment, never the query string
    let target = location(&response);
    assert!(target.starts_with("http://frontend.test#"));
    assert!(target.contains("access_token=AT1"));
    assert!(target.contains("token_type=Bearer"));
    assert!(!target.contains("?access_token"));

    assert_eq!(
        set_cookie_value(&response, REFRESH_COOKIE_NAME).as_deref(),
        Some("R1")
    );
    // State cookie is consumed
    assert_eq!(
        set_cookie_value(&response, STATE_COOKIE_NAME).as_deref(),
        Some("")
    );

    Ok(())
}

#[tokio::test]
async fn test_callback_state_mismatch_rejected() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    idp.mount_exchange_success("AT1", "R1").await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let (_state, state_cookie) = initiate_login(&gateway).await?;

    let response = TestGateway::client()
        .get(format!(
            "{}/api/auth/callback?code=auth-code&state=forged-state",
            gateway.url()
        ))
        .header(COOKIE, format!("{STATE_COOKIE_NAME}={state_cookie}"))
        .send()
        .await?;

    let target = location(&response);
    assert!(target.contains("error=authentication_failed"));
    assert!(target.contains("error_description=state_mismatch"));
    assert!(set_cookie_value(&response, REFRESH_COOKIE_NAME).is_none());

    Ok(())
}

#[tokio::test]
async fn test_callback_without_state_cookie_rejected() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    idp.mount_exchange_success("AT1", "R1").await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = TestGateway::client()
        .get(format!(
            "{}/api/auth/callback?code=auth-code&state=some-state",
            gateway.url()
        ))
        .send()
        .await?;

    let target = location(&response);
    assert!(target.contains("error_description=state_mismatch"));
    assert!(set_cookie_value(&response, REFRESH_COOKIE_NAME).is_none());

    Ok(())
}

#[tokio::test]
async fn test_callback_idp_error_reported_as_category() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = TestGateway::client()
        .get(format!(
            "{}/api/auth/callback?error=access_denied&error_description=User%20cancelled",
            gateway.url()
        ))
        .send()
        .await?;

    let target = location(&response);
    assert!(target.contains("error=authentication_failed"));
    assert!(target.contains("error_description=idp_error"));
    // Upstream wording never reaches the browser
    assert!(!target.contains("cancelled"));

    Ok(())
}

#[tokio::test]
async fn test_callback_exchange_failure_leaves_no_session() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    // No exchange mock mounted: the token endpoint answers 404
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let (state, state_cookie) = initiate_login(&gateway).await?;

    let response = TestGateway::client()
        .get(format!(
            "{}/api/auth/callback?code=auth-code&state={state}",
            gateway.url()
        ))
        .header(COOKIE, format!("{STATE_COOKIE_NAME}={state_cookie}"))
        .send()
        .await?;

    let target = location(&response);
    assert!(target.contains("error_description=exchange_failed"));
    assert!(set_cookie_value(&response, REFRESH_COOKIE_NAME).is_none());

    Ok(())
}

#[tokio::test]
async fn test_callback_is_redirect_even_on_failure() -> Result<(), anyhow::Error> {
    let idp = MockIdp::start().await;
    let gateway = TestGateway::spawn(&idp.base_url()).await?;

    let response = TestGateway::client()
        .get(format!("{}/api/auth/callback", gateway.url()))
        .send()
        .await?;

    assert_ne!(response.status(), StatusCode::OK);
    assert!(response.status().is_redirection());
    assert!(location(&response).starts_with("http://frontend.test#"));

    Ok(())
}
