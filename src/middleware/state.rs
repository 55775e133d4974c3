use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AuthSettings;
use super::extractor::SessionReader;
use crate::oauth::AuthClient;
use crate::session::{SessionCallbacks, UserRegistrar};

/// Shared state for auth route handlers.
pub(super) struct AuthState<R> {
    pub(super) client: Arc<AuthClient>,
    pub(super) callbacks: Arc<SessionCallbacks<R>>,
    pub(super) reader: SessionReader,
    pub(super) settings: AuthSettings,
}

// Manual Clone: derive would add an `R: Clone` bound.
impl<R> Clone for AuthState<R> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            callbacks: self.callbacks.clone(),
            reader: self.reader.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar extracts its key from state.
impl<R: UserRegistrar> FromRef<AuthState<R>> for Key {
    fn from_ref(state: &AuthState<R>) -> Self {
        state.settings.cookie_key.clone()
    }
}

