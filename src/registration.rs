//! Backend user registration.
//!
//! After a successful provider sign-in the identity is forwarded to the
//! backend's `/auth/login` endpoint, which finds or creates the user and
//! answers with its id. Every outcome is returned as a [`Registration`]
//! value so the sign-in flow is never interrupted by backend trouble.

use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::types::{Identity, ProviderAccount, Registration, UserId, non_empty};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

pub(crate) const MISSING_AUTH_DATA: &str = "Missing required authentication data";
pub(crate) const MISSING_ID_FIELD: &str = "Backend response missing ID field";

/// Request body for `POST {BACKEND_URL}/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub given_name: String,
    pub family_name: String,
    pub id_token: &'a str,
}

impl<'a> LoginRequest<'a> {
    /// Build the request body, or `None` when email or id token is missing.
    #[must_use]
    pub fn from_identity(identity: &'a Identity, account: &'a ProviderAccount) -> Option<Self> {
        let email = non_empty(identity.email.as_deref())?;
        let id_token = non_empty(account.id_token.as_deref())?;
        let (given_name, family_name) = identity.split_name();
        Some(Self {
            email,
            given_name,
            family_name,
            id_token,
        })
    }
}

/// HTTP client for the backend's login/registration endpoint.
#[derive(Debug, Clone)]
pub struct BackendClient {
    login_url: Url,
    http: reqwest::Client,
}

impl BackendClient {
    /// Client for the backend rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_url` cannot be a base URL.
    pub fn new(base_url: &Url) -> Result<Self, Error> {
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let login_url = base
            .join("auth/login")
            .map_err(|e| Error::Config(format!("BACKEND_URL: {e}")))?;

        // A redirect is a failed login, never something to follow.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("backend HTTP client: {e}")))?;

        Ok(Self { login_url, http })
    }

    /// Use a custom HTTP client (connection pool reuse or testing).
    ///
    /// The client should be built with `redirect::Policy::none()`; a client
    /// that follows redirects turns a `3xx` answer into a request the
    /// backend never saw.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    /// Register (or resolve) the signed-in user with the backend.
    ///
    /// Makes no network call when email or id token is missing. A single
    /// attempt is made; any failure comes back as [`Registration::Failed`].
    pub async fn register_user(
        &self,
        identity: &Identity,
        account: &ProviderAccount,
    ) -> Registration {
        let Some(body) = LoginRequest::from_identity(identity, account) else {
            tracing::warn!(
                has_email = non_empty(identity.email.as_deref()).is_some(),
                has_id_token = non_empty(account.id_token.as_deref()).is_some(),
                "{MISSING_AUTH_DATA}"
            );
            return Registration::failed(MISSING_AUTH_DATA);
        };

        match self.post_login(&body).await {
            Ok(id) => {
                tracing::info!(user_id = %id, "Registered user with backend");
                Registration::Registered { id }
            }
            Err(reason) => Registration::Failed { reason },
        }
    }

    async fn post_login(&self, body: &LoginRequest<'_>) -> Result<UserId, String> {
        let response = self
            .http
            .post(self.login_url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %self.login_url, "Backend auth request failed");
                e.to_string()
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let reason = format!("Backend auth failed: {} - {text}", status.as_u16());
            tracing::error!(status = status.as_u16(), body = %text, "Backend auth failed");
            return Err(reason);
        }

        let data: serde_json::Value = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Backend auth response is not JSON");
            e.to_string()
        })?;

        data.get("id").and_then(UserId::from_json).ok_or_else(|| {
            tracing::error!(response = %data, "{MISSING_ID_FIELD}");
            MISSING_ID_FIELD.to_owned()
        })
    }
}
