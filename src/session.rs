//! Session token enrichment and projection.
//!
//! [`SessionCallbacks`] runs at two points of the authentication lifecycle:
//! once at sign-in, to register the user with the backend and record the
//! outcome on the [`SessionToken`], and on every session read, to project
//! the token into the client-visible [`SessionView`].

use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{Identity, ProviderAccount, Registration};

/// Contents of the sealed session token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct SessionToken {
    /// Provider subject id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Backend-assigned user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_error: Option<String>,
}

impl SessionToken {
    /// Fresh token carrying the identity's display fields.
    #[must_use]
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            sub: identity.sub.as_ref().map(|s| s.0.clone()),
            email: identity.email.clone(),
            name: identity.name.clone(),
            picture: identity.picture.clone(),
            ..Self::default()
        }
    }
}

/// User part of [`SessionView`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SessionUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Client-visible session, recomputed from the token on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct SessionView {
    pub user: SessionUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

/// Registers a signed-in identity and returns the backend's answer.
///
/// `Err` is reserved for failures outside the registration protocol itself
/// (a panicking or misconfigured implementation); [`SessionCallbacks`]
/// treats it exactly like [`Registration::Failed`].
///
/// # Example
///
/// ```rust,ignore
/// impl UserRegistrar for MyDirectory {
///     async fn register(
///         &self,
///         identity: &Identity,
///         account: &ProviderAccount,
///     ) -> Result<Registration, Box<dyn std::error::Error + Send + Sync>> {
///         let id = self.db.upsert(identity.email.as_deref().unwrap_or_default()).await?;
///         Ok(Registration::Registered { id: id.into() })
///     }
/// }
/// ```
pub trait UserRegistrar: Send + Sync + 'static {
    fn register(
        &self,
        identity: &Identity,
        account: &ProviderAccount,
    ) -> impl Future<Output = Result<Registration, Box<dyn std::error::Error + Send + Sync>>> + Send;
}

#[cfg(feature = "oauth")]
impl UserRegistrar for crate::registration::BackendClient {
    async fn register(
        &self,
        identity: &Identity,
        account: &ProviderAccount,
    ) -> Result<Registration, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.register_user(identity, account).await)
    }
}

/// What the sign-in gate does when backend registration failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationFailureMode {
    /// Refuse sign-in.
    Blocking,
    /// Record the failure on the token and let the user in.
    #[default]
    NonBlocking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInDecision {
    Allow,
    Deny { reason: String },
}

/// Token enrichment, session projection and the sign-in gate.
pub struct SessionCallbacks<R> {
    registrar: R,
    provider_id: String,
    failure_mode: RegistrationFailureMode,
}

impl<R: UserRegistrar> SessionCallbacks<R> {
    /// Callbacks that register identities coming from `provider_id`.
    #[must_use]
    pub fn new(registrar: R, provider_id: impl Into<String>) -> Self {
        Self {
            registrar,
            provider_id: provider_id.into(),
            failure_mode: RegistrationFailureMode::default(),
        }
    }

    #[must_use]
    pub fn with_failure_mode(mut self, mode: RegistrationFailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    #[must_use]
    pub fn failure_mode(&self) -> RegistrationFailureMode {
        self.failure_mode
    }

    #[must_use]
    pub fn registrar(&self) -> &R {
        &self.registrar
    }

    /// Enrich a fresh token at first sign-in.
    ///
    /// Copies the provider tokens and, for the configured provider, records
    /// the backend id or the registration failure. Never fails.
    pub async fn enrich_token(
        &self,
        mut token: SessionToken,
        identity: &Identity,
        account: &ProviderAccount,
    ) -> SessionToken {
        token.access_token = account.access_token.clone();
        token.id_token = account.id_token.clone();

        if account.provider != self.provider_id {
            tracing::debug!(provider = %account.provider, "Skipping backend registration");
            return token;
        }

        tracing::debug!("Registering user with backend");
        match self.registrar.register(identity, account).await {
            Ok(Registration::Registered { id }) => {
                tracing::info!(user_id = %id, "Backend user id stored in token");
                token.user_id = Some(id.into());
            }
            Ok(Registration::Failed { reason }) => {
                tracing::error!(reason = %reason, "Backend registration failed");
                token.backend_error = Some(reason);
            }
            Err(e) => {
                tracing::error!(error = %e, "Error storing backend user id");
                token.backend_error = Some(e.to_string());
            }
        }
        token
    }

    /// Project a token into the client-visible session.
    ///
    /// The backend id wins; the provider subject id is the fallback.
    #[must_use]
    pub fn project_session(&self, token: &SessionToken, expires: OffsetDateTime) -> SessionView {
        project_session(token, expires)
    }

    /// Decide whether sign-in may complete given the enriched token.
    #[must_use]
    pub fn sign_in_gate(&self, token: &SessionToken) -> SignInDecision {
        match (self.failure_mode, token.backend_error.as_deref()) {
            (RegistrationFailureMode::Blocking, Some(reason)) => {
                tracing::warn!(reason = %reason, "Sign-in refused: backend registration failed");
                SignInDecision::Deny {
                    reason: reason.to_owned(),
                }
            }
            (RegistrationFailureMode::NonBlocking, Some(reason)) => {
                tracing::warn!(reason = %reason, "Sign-in allowed despite backend registration failure");
                SignInDecision::Allow
            }
            (_, None) => SignInDecision::Allow,
        }
    }
}

/// Session projection, usable without a registrar (token readers, extractors).
#[must_use]
pub fn project_session(token: &SessionToken, expires: OffsetDateTime) -> SessionView {
    let id = match (&token.user_id, &token.sub) {
        (Some(user_id), _) => Some(user_id.clone()),
        (None, Some(sub)) => {
            tracing::debug!(sub = %sub, "No backend user id in token, using provider subject");
            Some(sub.clone())
        }
        (None, None) => {
            tracing::debug!("No user id in token");
            None
        }
    };

    SessionView {
        user: SessionUser {
            id,
            email: token.email.clone(),
            name: token.name.clone(),
            image: token.picture.clone(),
        },
        access_token: token.access_token.clone(),
        backend_error: token.backend_error.clone(),
        expires,
    }
}
