use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

const PKCE_COOKIE_NAME: &str = "sensai.pkce.code_verifier";
const STATE_COOKIE_NAME: &str = "sensai.state";
// Long enough to finish the provider's consent screen.
const FLOW_COOKIE_TTL: Duration = Duration::minutes(15);

fn auth_cookie(
    name: &str,
    value: &str,
    path: &str,
    secure: bool,
    max_age: Duration,
) -> Cookie<'static> {
    Cookie::build((name.to_owned(), value.to_owned()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(path.to_owned())
        .max_age(max_age)
        .build()
}

fn expired_cookie(name: &str, path: &str) -> Cookie<'static> {
    Cookie::build((name.to_owned(), ""))
        .path(path.to_owned())
        .max_age(Duration::ZERO)
        .build()
}

/// PKCE verifier + state cookies, scoped to the auth routes.
pub(super) fn flow_cookies(
    code_verifier: &str,
    state: &str,
    secure: bool,
    auth_path: &str,
) -> [Cookie<'static>; 2] {
    [
        auth_cookie(PKCE_COOKIE_NAME, code_verifier, auth_path, secure, FLOW_COOKIE_TTL),
        auth_cookie(STATE_COOKIE_NAME, state, auth_path, secure, FLOW_COOKIE_TTL),
    ]
}

pub(super) fn clear_flow_cookies(auth_path: &str) -> [Cookie<'static>; 2] {
    [
        expired_cookie(PKCE_COOKIE_NAME, auth_path),
        expired_cookie(STATE_COOKIE_NAME, auth_path),
    ]
}

/// Session cookie holding the sealed token.
pub(super) fn session_cookie(
    name: &str,
    sealed: &str,
    max_age: std::time::Duration,
    secure: bool,
) -> Cookie<'static> {
    let seconds = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    auth_cookie(name, sealed, "/", secure, Duration::seconds(seconds))
}

pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    expired_cookie(name, "/")
}

pub(super) fn pkce_verifier(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(PKCE_COOKIE_NAME).map(|c| c.value().to_owned())
}

pub(super) fn flow_state(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(STATE_COOKIE_NAME).map(|c| c.value().to_owned())
}
