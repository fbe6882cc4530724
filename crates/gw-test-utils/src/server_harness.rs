//! Test server harness for gateway integration tests.
//!
//! Spawns the real gateway, wired against a mock IdP, on an ephemeral port.

use gw_service::config::{Config, DEFAULT_REFRESH_COOKIE_MAX_AGE_SECS};
use gw_service::handlers::AppState;
use gw_service::routes;
use secrecy::SecretString;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Running gateway instance for integration tests
///
/// # Example
/// ```rust,ignore
/// let idp = MockIdp::start().await;
/// let gateway = TestGateway::spawn(&idp.base_url()).await?;
///
/// let response = TestGateway::client()
///     .post(format!("{}/api/auth/refresh", gateway.url()))
///     .send()
///     .await?;
/// assert_eq!(response.status(), 401);
/// ```
pub struct TestGateway {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestGateway {
    /// Spawn a gateway bound to a random port, talking to the given IdP.
    pub async fn spawn(idp_base_url: &str) -> Result<Self, anyhow::Error> {
        let config = Config {
            bind_address: "127.0.0.1:0".to_string(),
            idp_base_url: idp_base_url.trim_end_matches('/').to_string(),
            idp_realm: "demo".to_string(),
            client_id: "gateway".to_string(),
            client_secret: SecretString::from("test-client-secret"),
            redirect_uri: "http://127.0.0.1/api/auth/callback".to_string(),
            frontend_url: "http://frontend.test".to_string(),
            cookie_domain: "127.0.0.1".to_string(),
            cookie_secure: false,
            refresh_cookie_max_age_secs: DEFAULT_REFRESH_COOKIE_MAX_AGE_SECS,
            idp_timeout_secs: 5,
        };

        let state = Arc::new(AppState::from_config(config.clone())?);
        let app = routes::build_routes(state)?;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Base URL of the running gateway.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// HTTP client that does not follow redirects, so tests can assert on
    /// Location headers and Set-Cookie directly.
    pub fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("test client must build")
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

/// Value of a named cookie from a response's Set-Cookie headers.
///
/// Returns `Some("")` for a clearing cookie, `None` when the response did
/// not touch the cookie at all. Tests rely on that distinction.
pub fn set_cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find_map(|raw| {
            let raw = raw.strip_prefix(&prefix)?;
            Some(raw.split(';').next().unwrap_or("").to_string())
        })
}
