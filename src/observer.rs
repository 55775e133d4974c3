//! Client-side session observer.
//!
//! Mirrors the session status into a small [`AuthSnapshot`] for UI code and
//! keeps authentication logging quiet: each user id is logged once for the
//! lifetime of the shared [`AuthLogDedup`], and repeated loading events are
//! ignored while a loading transition is already in progress.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

use crate::session::{SessionUser, SessionView};

static GLOBAL_DEDUP: LazyLock<Arc<AuthLogDedup>> = LazyLock::new(Arc::default);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Simplified session state for UI code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub user: Option<SessionUser>,
    /// Always `None`; failures surface through the session itself.
    pub error: Option<String>,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self {
            is_authenticated: false,
            is_loading: true,
            user: None,
            error: None,
        }
    }
}

/// Log line emitted for an observation, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    UserAuthenticated(String),
    AuthenticatedWithoutId,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    /// A loading event arrived during a loading transition; nothing changed.
    Ignored,
    Updated { event: Option<AuthEvent> },
}

#[derive(Debug, Default)]
struct DedupState {
    known_user_ids: HashSet<String>,
    logged_without_id: bool,
    loading: bool,
}

/// Shared bookkeeping that keeps authentication logs to one line per user.
///
/// Grows with every distinct user id until [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct AuthLogDedup {
    state: Mutex<DedupState>,
}

impl AuthLogDedup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance.
    #[must_use]
    pub fn global() -> Arc<Self> {
        GLOBAL_DEDUP.clone()
    }

    pub fn reset(&self) {
        *self.state.lock() = DedupState::default();
    }

    #[must_use]
    pub fn known_user_count(&self) -> usize {
        self.state.lock().known_user_ids.len()
    }

    /// Record the loading flag; `false` if this is a repeated loading event.
    fn enter(&self, is_loading: bool) -> bool {
        let mut state = self.state.lock();
        if state.loading && is_loading {
            return false;
        }
        state.loading = is_loading;
        true
    }

    fn first_sighting(&self, user_id: &str) -> bool {
        self.state.lock().known_user_ids.insert(user_id.to_owned())
    }

    fn first_without_id(&self) -> bool {
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.logged_without_id, true)
    }
}

/// Adapts session status changes into an [`AuthSnapshot`].
#[derive(Debug)]
pub struct SessionObserver {
    dedup: Arc<AuthLogDedup>,
    snapshot: AuthSnapshot,
}

impl SessionObserver {
    #[must_use]
    pub fn new(dedup: Arc<AuthLogDedup>) -> Self {
        Self {
            dedup,
            snapshot: AuthSnapshot::default(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &AuthSnapshot {
        &self.snapshot
    }

    /// Process one change of the session/status pair.
    pub fn observe(&mut self, status: SessionStatus, session: Option<&SessionView>) -> Observed {
        let is_authenticated = status == SessionStatus::Authenticated;
        let is_loading = status == SessionStatus::Loading;

        if !self.dedup.enter(is_loading) {
            return Observed::Ignored;
        }

        let mut event = None;
        if let (true, Some(session)) = (is_authenticated, session) {
            match session.user.id.as_deref() {
                Some(user_id) => {
                    if self.dedup.first_sighting(user_id) {
                        tracing::info!(user_id = %user_id, "User authenticated");
                        event = Some(AuthEvent::UserAuthenticated(user_id.to_owned()));
                    }
                }
                None => {
                    if self.dedup.first_without_id() {
                        tracing::info!("Session authenticated but no user ID");
                        event = Some(AuthEvent::AuthenticatedWithoutId);
                    }
                }
            }
        }

        if status == SessionStatus::Unauthenticated {
            tracing::info!("User not authenticated");
            event = Some(AuthEvent::Unauthenticated);
        }

        self.snapshot = AuthSnapshot {
            is_authenticated,
            is_loading,
            user: session.map(|s| s.user.clone()),
            error: None,
        };
        Observed::Updated { event }
    }

    /// Fetch the session from the server and observe the result.
    ///
    /// A failed fetch is logged and observed as unauthenticated.
    #[cfg(feature = "oauth")]
    pub async fn refresh(&mut self, client: &SessionClient, session_token: Option<&str>) -> Observed {
        self.observe(SessionStatus::Loading, None);
        match client.fetch(session_token).await {
            Ok((status, view)) => self.observe(status, view.as_ref()),
            Err(e) => {
                tracing::warn!(error = %e, "Session fetch failed");
                self.observe(SessionStatus::Unauthenticated, None)
            }
        }
    }
}

/// Reads the projected session from the server's session endpoint.
#[cfg(feature = "oauth")]
#[derive(Debug, Clone)]
pub struct SessionClient {
    session_url: url::Url,
    cookie_name: String,
    http: reqwest::Client,
}

#[cfg(feature = "oauth")]
impl SessionClient {
    #[must_use]
    pub fn new(session_url: url::Url, cookie_name: impl Into<String>) -> Self {
        Self {
            session_url,
            cookie_name: cookie_name.into(),
            http: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Fetch the session. An empty object or `401` means unauthenticated.
    ///
    /// # Errors
    ///
    /// [`Error::Http`](crate::Error::Http) on transport or decoding failure,
    /// [`Error::OAuth`](crate::Error::OAuth) on any other non-2xx answer.
    pub async fn fetch(
        &self,
        session_token: Option<&str>,
    ) -> Result<(SessionStatus, Option<SessionView>), crate::Error> {
        let mut request = self.http.get(self.session_url.clone());
        if let Some(token) = session_token {
            request = request.header(
                reqwest::header::COOKIE,
                format!("{}={token}", self.cookie_name),
            );
        }
        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Ok((SessionStatus::Unauthenticated, None));
        }
        if !status.is_success() {
            return Err(crate::Error::OAuth {
                operation: "session fetch",
                status: Some(status.as_u16()),
                detail: response.text().await.unwrap_or_default(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        if body.as_object().is_none_or(|o| o.is_empty()) {
            return Ok((SessionStatus::Unauthenticated, None));
        }
        let view: SessionView = serde_json::from_value(body)
            .map_err(|e| crate::Error::Token(format!("session payload: {e}")))?;
        Ok((SessionStatus::Authenticated, Some(view)))
    }
}
