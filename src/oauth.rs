use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::pkce::{self, PkcePair};
use crate::types::{Identity, ProviderAccount};

/// Provider id recorded on accounts created through [`AuthClient`].
pub const GOOGLE_PROVIDER_ID: &str = "google";

/// Google `OAuth2` configuration.
///
/// Client credentials and redirect URI are constructor parameters; endpoints
/// and scopes default to Google's and can be overridden (tests point them at
/// a mock server).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) provider_id: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) userinfo_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
}

impl OAuthConfig {
    #[must_use]
    pub fn google(client_id: impl Into<String>, redirect_uri: Url) -> Self {
        Self {
            provider_id: GOOGLE_PROVIDER_ID.into(),
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri,
            auth_url: Url::parse("https://accounts.google.com/o/oauth2/v2/auth")
                .expect("valid default URL"),
            token_url: Url::parse("https://oauth2.googleapis.com/token")
                .expect("valid default URL"),
            userinfo_url: Url::parse("https://openidconnect.googleapis.com/v1/userinfo")
                .expect("valid default URL"),
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
        }
    }

    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    #[must_use]
    pub fn with_userinfo_url(mut self, url: Url) -> Self {
        self.userinfo_url = url;
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Authorization redirect plus the PKCE/state values to keep until the callback.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

/// Google token endpoint response.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// `OAuth2` authorization-code client for the identity provider.
pub struct AuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut OAuthConfig {
        &mut self.config
    }

    /// Build the provider redirect with fresh PKCE and state values.
    #[must_use]
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let state = pkce::generate_state();
        let pkce = PkcePair::generate();

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256");

        AuthorizationRequest {
            url: url.into(),
            state,
            code_verifier: pkce.verifier,
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// [`Error::Http`] on transport failure, [`Error::OAuth`] on a non-2xx answer.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, Error> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let response = ensure_success(response, "token exchange").await?;
        Ok(response.json::<TokenResponse>().await?)
    }

    /// Fetch the identity assertion for an access token.
    ///
    /// # Errors
    ///
    /// [`Error::Http`] on transport failure, [`Error::OAuth`] on a non-2xx answer.
    pub async fn get_identity(&self, access_token: &str) -> Result<Identity, Error> {
        let response = self
            .http
            .get(self.config.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = ensure_success(response, "userinfo request").await?;
        Ok(response.json::<Identity>().await?)
    }

    /// Account record for a completed token exchange.
    #[must_use]
    pub fn account_for(&self, tokens: &TokenResponse) -> ProviderAccount {
        let account = ProviderAccount::new(self.config.provider_id.clone())
            .with_access_token(tokens.access_token.clone());
        match tokens.id_token.as_deref() {
            Some(id_token) => account.with_id_token(id_token),
            None => account,
        }
    }
}

async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let detail = response.text().await.unwrap_or_default();
    Err(Error::OAuth {
        operation,
        status: Some(status),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> OAuthConfig {
        OAuthConfig::google("test-client", "https://app.example.com/cb".parse().unwrap())
    }

    #[test]
    fn authorization_url_carries_pkce_and_scopes() {
        let client = AuthClient::new(test_config());
        let req = client.authorization_url();

        assert!(req.url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(req.url.contains("response_type=code"));
        assert!(req.url.contains("client_id=test-client"));
        assert!(req.url.contains("code_challenge_method=S256"));
        assert!(req.url.contains("scope=openid+email+profile"));
        assert!(req.url.contains(&format!("state={}", req.state)));
        assert!(req.url.contains(&pkce::challenge_for(&req.code_verifier)));
    }

    #[test]
    fn authorization_requests_are_unique() {
        let client = AuthClient::new(test_config());
        let a = client.authorization_url();
        let b = client.authorization_url();
        assert_ne!(a.state, b.state);
        assert_ne!(a.code_verifier, b.code_verifier);
    }

    #[tokio::test]
    async fn exchange_code_sends_secret_and_parses_id_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("client_secret=shh"))
            .and(body_string_contains("code_verifier=verifier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "id_token": "it",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config()
            .with_client_secret("shh")
            .with_token_url(format!("{}/token", server.uri()).parse().unwrap());
        let client = AuthClient::new(config);

        let tokens = client.exchange_code("abc", "verifier").await.unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.id_token.as_deref(), Some("it"));

        let account = client.account_for(&tokens);
        assert_eq!(account.provider, GOOGLE_PROVIDER_ID);
        assert_eq!(account.id_token.as_deref(), Some("it"));
    }

    #[tokio::test]
    async fn exchange_code_surfaces_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let config =
            test_config().with_token_url(format!("{}/token", server.uri()).parse().unwrap());
        let err = AuthClient::new(config)
            .exchange_code("abc", "verifier")
            .await
            .unwrap_err();

        match err {
            Error::OAuth { status, detail, .. } => {
                assert_eq!(status, Some(400));
                assert_eq!(detail, "invalid_grant");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn get_identity_uses_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "g-1",
                "email": "a@b.com",
                "name": "Jane Q Doe"
            })))
            .mount(&server)
            .await;

        let config =
            test_config().with_userinfo_url(format!("{}/userinfo", server.uri()).parse().unwrap());
        let identity = AuthClient::new(config).get_identity("at").await.unwrap();
        assert_eq!(identity.email.as_deref(), Some("a@b.com"));
        assert_eq!(identity.name.as_deref(), Some("Jane Q Doe"));
    }
}
