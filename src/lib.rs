#![doc = include_str!("../README.md")]

pub mod error;
#[cfg(feature = "middleware")]
pub mod middleware;
#[cfg(feature = "oauth")]
pub mod oauth;
pub mod observer;
#[cfg(feature = "oauth")]
pub mod pkce;
#[cfg(feature = "oauth")]
pub mod registration;
pub mod session;
#[cfg(feature = "token")]
pub mod token;
pub mod types;

// Re-exports for convenient access
pub use error::Error;
#[cfg(feature = "oauth")]
pub use oauth::{AuthClient, AuthorizationRequest, GOOGLE_PROVIDER_ID, OAuthConfig, TokenResponse};
#[cfg(feature = "oauth")]
pub use observer::SessionClient;
pub use observer::{AuthEvent, AuthLogDedup, AuthSnapshot, Observed, SessionObserver, SessionStatus};
#[cfg(feature = "oauth")]
pub use registration::{BackendClient, DEFAULT_BACKEND_URL, LoginRequest};
pub use session::{
    RegistrationFailureMode, SessionCallbacks, SessionToken, SessionUser, SessionView,
    SignInDecision, UserRegistrar, project_session,
};
#[cfg(feature = "token")]
pub use token::{OpenedToken, TokenCodec};
pub use types::{Identity, ProviderAccount, Registration, SubjectId, UserId};
