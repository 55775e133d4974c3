use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use super::error::AuthError;
use crate::session::{SessionView, project_session};
use crate::token::TokenCodec;

/// Everything needed to turn a session cookie into a [`SessionView`].
///
/// Obtain one from [`AuthConfig::session_reader`](super::AuthConfig::session_reader)
/// and make it reachable from your router state via `FromRef`.
#[derive(Debug, Clone)]
pub struct SessionReader {
    pub(super) codec: TokenCodec,
    pub(super) cookie_name: String,
    pub(super) sign_in_page: String,
}

impl SessionReader {
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn sign_in_page(&self) -> &str {
        &self.sign_in_page
    }
}

/// Signed-in session extracted from the session cookie.
///
/// Redirects to the sign-in page when there is no valid session. Use
/// `Option<AuthSession>` for routes open to anonymous users.
///
/// ```rust,ignore
/// async fn dashboard(AuthSession(session): AuthSession) -> impl IntoResponse {
///     format!("Hello, {}", session.user.id.unwrap_or_default())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthSession(pub SessionView);

impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
    SessionReader: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let reader = SessionReader::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        resolve_session(&reader, &jar)
            .map(AuthSession)
            .ok_or(AuthError::SignInRequired {
                sign_in_page: reader.sign_in_page,
            })
    }
}

impl<S> OptionalFromRequestParts<S> for AuthSession
where
    S: Send + Sync,
    SessionReader: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let reader = SessionReader::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(resolve_session(&reader, &jar).map(AuthSession))
    }
}

/// Open the session cookie and project it, or `None` without a valid session.
#[must_use]
pub fn resolve_session(reader: &SessionReader, jar: &CookieJar) -> Option<SessionView> {
    let cookie = jar.get(&reader.cookie_name)?;
    match reader.codec.open(cookie.value()) {
        Ok(opened) => Some(project_session(&opened.token, opened.expires)),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring invalid session cookie");
            None
        }
    }
}
