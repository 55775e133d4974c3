use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum_extra::extract::{CookieJar, PrivateCookieJar};
use serde::Deserialize;

use super::config::AuthConfig;
use super::cookies;
use super::error::AuthError;
use super::state::AuthState;
use crate::session::{SessionCallbacks, SessionToken, SignInDecision, UserRegistrar};

/// Create the authentication router.
///
/// Mounts, under the configured auth path (default `/api/auth`):
/// - `GET /signin/google`: start the provider flow
/// - `GET /callback/google`: provider redirect target
/// - `GET /session`: current session as JSON (`{}` when signed out)
/// - `GET|POST /signout`: drop the session
pub fn auth_routes<R: UserRegistrar>(config: AuthConfig, registrar: R) -> Router {
    let auth_path = config.settings.auth_path.clone();
    let provider = config.client.config().provider_id().to_owned();
    let reader = config.session_reader();
    let callbacks =
        SessionCallbacks::new(registrar, provider.clone()).with_failure_mode(config.failure_mode);

    let state = AuthState {
        client: Arc::new(config.client),
        callbacks: Arc::new(callbacks),
        reader,
        settings: config.settings,
    };

    Router::new()
        .route(&format!("{auth_path}/signin/{provider}"), get(signin::<R>))
        .route(&format!("{auth_path}/callback/{provider}"), get(callback::<R>))
        .route(&format!("{auth_path}/session"), get(session::<R>))
        .route(
            &format!("{auth_path}/signout"),
            get(signout::<R>).post(signout::<R>),
        )
        .with_state(state)
}

// ── Sign-in ────────────────────────────────────────────────────────

async fn signin<R: UserRegistrar>(
    State(state): State<AuthState<R>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let auth_req = state.client.authorization_url();

    let [verifier, flow_state] = cookies::flow_cookies(
        &auth_req.code_verifier,
        &auth_req.state,
        state.settings.secure_cookies,
        &state.settings.auth_path,
    );

    (jar.add(verifier).add(flow_state), Redirect::to(&auth_req.url))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback<R: UserRegistrar>(
    State(state): State<AuthState<R>>,
    private_jar: PrivateCookieJar,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, CookieJar, Redirect), AuthError> {
    let sign_in_page = state.settings.sign_in_page.as_str();

    if let Some(error) = &params.error {
        let desc = params.error_description.as_deref().unwrap_or("Unknown error");
        tracing::warn!(error = %error, description = %desc, "OAuth2 error from provider");
        return Err(login_error(sign_in_page, error));
    }

    let code = params
        .code
        .ok_or_else(|| login_error(sign_in_page, "missing_code"))?;

    let received_state = params
        .state
        .ok_or_else(|| login_error(sign_in_page, "state_mismatch"))?;
    let stored_state = cookies::flow_state(&private_jar)
        .ok_or_else(|| login_error(sign_in_page, "state_mismatch"))?;
    if received_state != stored_state {
        tracing::warn!("OAuth state mismatch");
        return Err(login_error(sign_in_page, "state_mismatch"));
    }

    let code_verifier = cookies::pkce_verifier(&private_jar)
        .ok_or_else(|| login_error(sign_in_page, "missing_verifier"))?;

    let tokens = state
        .client
        .exchange_code(&code, &code_verifier)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Token exchange failed");
            login_error(sign_in_page, "token_exchange_failed")
        })?;

    let identity = state
        .client
        .get_identity(&tokens.access_token)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Userinfo request failed");
            login_error(sign_in_page, "userinfo_failed")
        })?;

    let account = state.client.account_for(&tokens);
    let token = state
        .callbacks
        .enrich_token(SessionToken::from_identity(&identity), &identity, &account)
        .await;

    if let SignInDecision::Deny { reason } = state.callbacks.sign_in_gate(&token) {
        tracing::warn!(reason = %reason, email = ?identity.email, "Sign-in denied");
        return Err(login_error(sign_in_page, "registration_failed"));
    }

    let sealed = state.reader.codec.seal(&token).map_err(|e| {
        tracing::error!(error = %e, "Session token sealing failed");
        login_error(sign_in_page, "session_failed")
    })?;

    let session_cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        &sealed,
        state.reader.codec.max_age(),
        state.settings.secure_cookies,
    );
    let [clear_verifier, clear_state] = cookies::clear_flow_cookies(&state.settings.auth_path);

    tracing::info!(
        email = ?identity.email,
        user_id = ?token.user_id,
        backend_error = ?token.backend_error,
        "Sign-in successful"
    );

    Ok((
        private_jar.add(clear_verifier).add(clear_state),
        jar.add(session_cookie),
        Redirect::to(&state.settings.login_redirect),
    ))
}

// ── Session ────────────────────────────────────────────────────────

async fn session<R: UserRegistrar>(
    State(state): State<AuthState<R>>,
    jar: CookieJar,
) -> Response {
    let name = state.settings.session_cookie_name.as_str();
    let Some(cookie) = jar.get(name) else {
        return Json(serde_json::json!({})).into_response();
    };

    match state.reader.codec.reseal(cookie.value()) {
        Ok((renewed, opened)) => {
            let view = state.callbacks.project_session(&opened.token, opened.expires);
            let cookie = cookies::session_cookie(
                name,
                &renewed,
                state.reader.codec.max_age(),
                state.settings.secure_cookies,
            );
            (jar.add(cookie), Json(view)).into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Dropping invalid session cookie");
            let jar = jar.remove(cookies::clear_session_cookie(name));
            (jar, Json(serde_json::json!({}))).into_response()
        }
    }
}

// ── Sign-out ───────────────────────────────────────────────────────

async fn signout<R: UserRegistrar>(
    State(state): State<AuthState<R>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let clear = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    (jar.remove(clear), Redirect::to(&state.settings.logout_redirect))
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_error(sign_in_page: &str, code: &str) -> AuthError {
    AuthError::OAuth {
        sign_in_page: sign_in_page.to_owned(),
        code: code.to_owned(),
    }
}

