use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use url::Url;

use super::error::AuthError;
use super::extractor::SessionReader;
use crate::oauth::{AuthClient, OAuthConfig};
use crate::registration::{BackendClient, DEFAULT_BACKEND_URL};
use crate::session::RegistrationFailureMode;
use crate::token::TokenCodec;

pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
pub const DEFAULT_AUTH_PATH: &str = "/api/auth";
pub const DEFAULT_SIGN_IN_PAGE: &str = "/login";
const SESSION_COOKIE: &str = "sensai.session-token";
const COOKIE_KEY_LABEL: &[u8] = b"sensai-auth cookie key v1\0";

/// Route and cookie settings shared by config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) login_redirect: String,
    pub(crate) logout_redirect: String,
    pub(crate) sign_in_page: String,
}

/// Authentication configuration.
///
/// Use [`from_env()`](AuthConfig::from_env) for the usual deployment, or
/// [`new()`](AuthConfig::new) with `with_*` methods for full control.
pub struct AuthConfig {
    pub(super) client: AuthClient,
    pub(super) codec: TokenCodec,
    pub(super) backend_url: Url,
    pub(super) failure_mode: RegistrationFailureMode,
    pub(super) debug: bool,
    pub(super) settings: AuthSettings,
}

impl AuthConfig {
    /// Create config from the provider client and the application secret.
    ///
    /// Both the session-token key and the cookie key are derived from `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the secret is too short.
    pub fn new(client: AuthClient, secret: &[u8]) -> Result<Self, AuthError> {
        let codec = TokenCodec::from_secret(secret)?;
        let digest = Sha512::new()
            .chain_update(COOKIE_KEY_LABEL)
            .chain_update(secret)
            .finalize();
        let cookie_key = Key::try_from(digest.as_slice())
            .map_err(|_| AuthError::Config("cookie key: derived key too short".into()))?;
        let secure_cookies = client.config().redirect_uri().scheme() == "https";
        let backend_url = parse_url("BACKEND_URL", DEFAULT_BACKEND_URL)?;

        Ok(Self {
            client,
            codec,
            backend_url,
            failure_mode: RegistrationFailureMode::default(),
            debug: false,
            settings: AuthSettings {
                cookie_key,
                session_cookie_name: session_cookie_name(secure_cookies),
                secure_cookies,
                auth_path: DEFAULT_AUTH_PATH.into(),
                login_redirect: "/".into(),
                logout_redirect: "/".into(),
                sign_in_page: DEFAULT_SIGN_IN_PAGE.into(),
            },
        })
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `GOOGLE_CLIENT_ID`: OAuth2 client ID
    /// - `NEXTAUTH_SECRET`: session secret, at least 32 bytes
    ///
    /// # Optional env vars
    /// - `GOOGLE_CLIENT_SECRET`: OAuth2 client secret
    /// - `NEXTAUTH_URL`: public base URL (default `http://localhost:3000`); `https` enables secure cookies
    /// - `BACKEND_URL`: backend base URL (default `http://localhost:8000`)
    /// - `NODE_ENV`: `development` enables debug logging
    /// - `REGISTRATION_FAILURE_MODE`: `blocking` or `non-blocking` (default)
    /// - `GOOGLE_AUTH_URL`, `GOOGLE_TOKEN_URL`, `GOOGLE_USERINFO_URL`: endpoint overrides
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let client_id = lookup("GOOGLE_CLIENT_ID")
            .ok_or_else(|| AuthError::Config("GOOGLE_CLIENT_ID is required".into()))?;
        let secret = lookup("NEXTAUTH_SECRET")
            .ok_or_else(|| AuthError::Config("NEXTAUTH_SECRET is required".into()))?;

        let public_url = parse_url(
            "NEXTAUTH_URL",
            &lookup("NEXTAUTH_URL").unwrap_or_else(|| DEFAULT_PUBLIC_URL.into()),
        )?;
        let redirect_uri = callback_url(&public_url, DEFAULT_AUTH_PATH)?;

        let mut oauth = OAuthConfig::google(client_id, redirect_uri);
        match lookup("GOOGLE_CLIENT_SECRET") {
            Some(client_secret) => oauth = oauth.with_client_secret(client_secret),
            None => tracing::warn!("GOOGLE_CLIENT_SECRET is not set; token exchange relies on PKCE only"),
        }
        if let Some(url) = lookup("GOOGLE_AUTH_URL") {
            oauth = oauth.with_auth_url(parse_url("GOOGLE_AUTH_URL", &url)?);
        }
        if let Some(url) = lookup("GOOGLE_TOKEN_URL") {
            oauth = oauth.with_token_url(parse_url("GOOGLE_TOKEN_URL", &url)?);
        }
        if let Some(url) = lookup("GOOGLE_USERINFO_URL") {
            oauth = oauth.with_userinfo_url(parse_url("GOOGLE_USERINFO_URL", &url)?);
        }

        let backend_url = parse_url(
            "BACKEND_URL",
            &lookup("BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.into()),
        )?;

        let failure_mode = match lookup("REGISTRATION_FAILURE_MODE").as_deref() {
            None | Some("non-blocking") => RegistrationFailureMode::NonBlocking,
            Some("blocking") => RegistrationFailureMode::Blocking,
            Some(other) => {
                return Err(AuthError::Config(format!(
                    "REGISTRATION_FAILURE_MODE: expected `blocking` or `non-blocking`, got `{other}`"
                )));
            }
        };

        let debug = lookup("NODE_ENV").as_deref() == Some("development");

        Ok(Self::new(AuthClient::new(oauth), secret.as_bytes())?
            .with_backend_url(backend_url)
            .with_failure_mode(failure_mode)
            .with_debug(debug))
    }

    #[must_use]
    pub fn with_backend_url(mut self, url: Url) -> Self {
        self.backend_url = url;
        self
    }

    #[must_use]
    pub fn with_failure_mode(mut self, mode: RegistrationFailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_session_max_age(mut self, max_age: std::time::Duration) -> Self {
        self.codec = self.codec.with_max_age(max_age);
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    /// Toggle the `Secure` cookie attribute.
    ///
    /// The default session cookie name follows: `__Secure-` is only valid on
    /// secure cookies. A name set through
    /// [`with_session_cookie_name`](Self::with_session_cookie_name) is kept.
    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        if self.settings.session_cookie_name == session_cookie_name(self.settings.secure_cookies) {
            self.settings.session_cookie_name = session_cookie_name(secure);
        }
        self.settings.secure_cookies = secure;
        self
    }

    /// Mount point of the auth routes.
    ///
    /// A redirect URI pointing at the previous callback route is moved along;
    /// any other redirect URI is left as configured.
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        let provider = self.client.config().provider_id().to_owned();
        let old_callback = format!("{}/callback/{provider}", self.settings.auth_path);

        let redirect_uri = &mut self.client.config_mut().redirect_uri;
        if let Some(prefix) = redirect_uri.path().strip_suffix(old_callback.as_str()) {
            let moved = format!("{prefix}{path}/callback/{provider}");
            redirect_uri.set_path(&moved);
        }

        self.settings.auth_path = path;
        self
    }

    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_sign_in_page(mut self, path: impl Into<String>) -> Self {
        self.settings.sign_in_page = path.into();
        self
    }

    #[must_use]
    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    #[must_use]
    pub fn failure_mode(&self) -> RegistrationFailureMode {
        self.failure_mode
    }

    /// Whether debug logging was requested (`NODE_ENV=development`).
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.settings.session_cookie_name
    }

    #[must_use]
    pub fn auth_path(&self) -> &str {
        &self.settings.auth_path
    }

    /// Registration client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the backend URL cannot be a base URL.
    pub fn backend_client(&self) -> Result<BackendClient, AuthError> {
        Ok(BackendClient::new(&self.backend_url)?)
    }

    /// Session reader for application routes using [`AuthSession`](super::AuthSession).
    #[must_use]
    pub fn session_reader(&self) -> SessionReader {
        SessionReader {
            codec: self.codec.clone(),
            cookie_name: self.settings.session_cookie_name.clone(),
            sign_in_page: self.settings.sign_in_page.clone(),
        }
    }
}

fn session_cookie_name(secure: bool) -> String {
    if secure {
        format!("__Secure-{SESSION_COOKIE}")
    } else {
        SESSION_COOKIE.into()
    }
}

fn parse_url(var: &str, value: &str) -> Result<Url, AuthError> {
    value
        .parse()
        .map_err(|e| AuthError::Config(format!("{var}: {e}")))
}

fn callback_url(public_url: &Url, auth_path: &str) -> Result<Url, AuthError> {
    let base = public_url.as_str().trim_end_matches('/');
    let provider = crate::oauth::GOOGLE_PROVIDER_ID;
    parse_url("NEXTAUTH_URL", &format!("{base}{auth_path}/callback/{provider}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_from_minimal_env() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            ("GOOGLE_CLIENT_ID", "cid"),
            ("NEXTAUTH_SECRET", SECRET),
        ]))
        .unwrap();

        assert_eq!(config.backend_url().as_str(), "http://localhost:8000/");
        assert_eq!(
            config.client.config().redirect_uri().as_str(),
            "http://localhost:3000/api/auth/callback/google"
        );
        assert_eq!(config.failure_mode(), RegistrationFailureMode::NonBlocking);
        assert!(!config.debug());
        assert!(!config.settings.secure_cookies);
        assert_eq!(config.session_cookie_name(), "sensai.session-token");
        assert_eq!(config.settings.sign_in_page, "/login");
    }

    #[test]
    fn full_env() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            ("GOOGLE_CLIENT_ID", "cid"),
            ("GOOGLE_CLIENT_SECRET", "csecret"),
            ("NEXTAUTH_SECRET", SECRET),
            ("NEXTAUTH_URL", "https://app.sensai.example/"),
            ("BACKEND_URL", "http://backend:8001"),
            ("NODE_ENV", "development"),
            ("REGISTRATION_FAILURE_MODE", "blocking"),
        ]))
        .unwrap();

        assert_eq!(config.backend_url().as_str(), "http://backend:8001/");
        assert_eq!(
            config.client.config().redirect_uri().as_str(),
            "https://app.sensai.example/api/auth/callback/google"
        );
        assert_eq!(config.client.config().client_secret.as_deref(), Some("csecret"));
        assert_eq!(config.failure_mode(), RegistrationFailureMode::Blocking);
        assert!(config.debug());
        assert!(config.settings.secure_cookies);
        assert_eq!(config.session_cookie_name(), "__Secure-sensai.session-token");
        assert_eq!(
            config.backend_client().unwrap().login_url().as_str(),
            "http://backend:8001/auth/login"
        );
    }

    #[test]
    fn insecure_override_drops_secure_prefix() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            ("GOOGLE_CLIENT_ID", "cid"),
            ("NEXTAUTH_SECRET", SECRET),
            ("NEXTAUTH_URL", "https://app.sensai.example"),
        ]))
        .unwrap();
        assert_eq!(config.session_cookie_name(), "__Secure-sensai.session-token");

        let config = config.with_secure_cookies(false);
        assert!(!config.settings.secure_cookies);
        assert_eq!(config.session_cookie_name(), "sensai.session-token");
        assert_eq!(config.session_reader().cookie_name(), "sensai.session-token");

        let config = config.with_secure_cookies(true);
        assert_eq!(config.session_cookie_name(), "__Secure-sensai.session-token");

        let custom = config
            .with_session_cookie_name("sid")
            .with_secure_cookies(false);
        assert_eq!(custom.session_cookie_name(), "sid");
    }

    #[test]
    fn auth_path_moves_callback_redirect() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            ("GOOGLE_CLIENT_ID", "cid"),
            ("NEXTAUTH_SECRET", SECRET),
            ("NEXTAUTH_URL", "https://app.sensai.example/portal"),
        ]))
        .unwrap()
        .with_auth_path("/auth");

        assert_eq!(config.auth_path(), "/auth");
        assert_eq!(
            config.client.config().redirect_uri().as_str(),
            "https://app.sensai.example/portal/auth/callback/google"
        );
    }

    #[test]
    fn auth_path_keeps_custom_redirect() {
        let oauth = OAuthConfig::google(
            "cid",
            "https://sso.sensai.example/return".parse().unwrap(),
        );
        let config = AuthConfig::new(AuthClient::new(oauth), SECRET.as_bytes())
            .unwrap()
            .with_auth_path("/auth");
        assert_eq!(
            config.client.config().redirect_uri().as_str(),
            "https://sso.sensai.example/return"
        );
    }

    #[test]
    fn missing_required_vars() {
        let err = AuthConfig::from_lookup(lookup_from(&[("NEXTAUTH_SECRET", SECRET)]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("GOOGLE_CLIENT_ID"));

        let err = AuthConfig::from_lookup(lookup_from(&[("GOOGLE_CLIENT_ID", "cid")]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("NEXTAUTH_SECRET"));
    }

    #[test]
    fn invalid_values() {
        let short = AuthConfig::from_lookup(lookup_from(&[
            ("GOOGLE_CLIENT_ID", "cid"),
            ("NEXTAUTH_SECRET", "short"),
        ]));
        assert!(matches!(short, Err(AuthError::Config(_))));

        let bad_url = AuthConfig::from_lookup(lookup_from(&[
            ("GOOGLE_CLIENT_ID", "cid"),
            ("NEXTAUTH_SECRET", SECRET),
            ("BACKEND_URL", "not a url"),
        ]));
        assert!(matches!(bad_url, Err(AuthError::Config(msg)) if msg.starts_with("BACKEND_URL")));

        let bad_mode = AuthConfig::from_lookup(lookup_from(&[
            ("GOOGLE_CLIENT_ID", "cid"),
            ("NEXTAUTH_SECRET", SECRET),
            ("REGISTRATION_FAILURE_MODE", "sometimes"),
        ]));
        assert!(matches!(bad_mode, Err(AuthError::Config(_))));
    }
}
