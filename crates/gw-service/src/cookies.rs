//! Cookie codec for the rotation-sensitive secrets the gateway hands to the
//! browser.
//!
//! Two cookies exist:
//! - the refresh-token cookie, long-lived, path-restricted to the refresh
//!   endpoint so no other request ever transmits it
//! - the login-state cookie, a 5-minute binding between login-initiate and
//!   callback
//!
//! The codec knows nothing about token semantics. Issue and clear share one
//! builder so identity fields (name, path, domain, flags) never drift between
//! the two; a drifted clear leaves stale duplicates behind in browsers.
//! Cookie values are never logged.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

/// Name of the refresh-token cookie.
pub const REFRESH_COOKIE_NAME: &str = "kc_refresh_token";

/// Only requests to this path carry the refresh cookie back to us.
pub const REFRESH_COOKIE_PATH: &str = "/api/auth/refresh";

/// Name of the login-state binding cookie.
pub const STATE_COOKIE_NAME: &str = "kc_auth_state";

/// The state cookie is only ever needed at the callback.
pub const STATE_COOKIE_PATH: &str = "/api/auth/callback";

/// Login-initiate to callback must complete within this window.
const STATE_COOKIE_TTL: Duration = Duration::minutes(5);

/// Deployment-dependent cookie parameters.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub domain: String,
    /// Reflects whether the deployment is transport-encrypted.
    pub secure: bool,
    pub refresh_max_age_secs: i64,
}

fn refresh_cookie_base(value: String, max_age: Duration, settings: &CookieSettings) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, value))
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .max_age(max_age)
        .domain(settings.domain.clone())
        .build()
}

/// Build the refresh-token cookie for a freshly exchanged or rotated token.
pub fn refresh_cookie(refresh_token: &str, settings: &CookieSettings) -> Cookie<'static> {
    refresh_cookie_base(
        refresh_token.to_string(),
        Duration::seconds(settings.refresh_max_age_secs),
        settings,
    )
}

/// Build the removal cookie for the refresh token.
///
/// Same identity and flags as [`refresh_cookie`], empty value, zero lifetime;
/// browsers treat this as immediate deletion.
pub fn clear_refresh_cookie(settings: &CookieSettings) -> Cookie<'static> {
    refresh_cookie_base(String::new(), Duration::ZERO, settings)
}

/// Read the refresh token from the inbound cookie jar, if present.
///
/// No validation happens here; whether the token is still live is the IdP's
/// call during the refresh exchange.
pub fn extract_refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn state_cookie_base(value: String, max_age: Duration, settings: &CookieSettings) -> Cookie<'static> {
    // Lax, not Strict: the callback arrives as a top-level navigation from
    // the IdP's origin, and Strict cookies are withheld on those.
    Cookie::build((STATE_COOKIE_NAME, value))
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Lax)
        .path(STATE_COOKIE_PATH)
        .max_age(max_age)
        .domain(settings.domain.clone())
        .build()
}

/// Build the login-state binding cookie.
pub fn state_cookie(state: &str, settings: &CookieSettings) -> Cookie<'static> {
    state_cookie_base(state.to_string(), STATE_COOKIE_TTL, settings)
}

/// Build the removal cookie for the login state.
pub fn clear_state_cookie(settings: &CookieSettings) -> Cookie<'static> {
    state_cookie_base(String::new(), Duration::ZERO, settings)
}

/// Read the pending login state from the inbound cookie jar, if present.
pub fn extract_state(jar: &CookieJar) -> Option<String> {
    jar.get(STATE_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
