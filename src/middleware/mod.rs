//! Google sign-in routes and session extraction for Axum.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sensai_auth::middleware::{AuthConfig, AuthSession, auth_routes};
//!
//! // 1. Configure from environment (GOOGLE_CLIENT_ID, NEXTAUTH_SECRET, BACKEND_URL, ...)
//! let config = AuthConfig::from_env()?;
//! let reader = config.session_reader();
//!
//! // 2. Register users with the backend on sign-in
//! let registrar = config.backend_client()?;
//!
//! // 3. Mount auth routes next to your app
//! let app = axum::Router::new()
//!     .route("/", get(home))
//!     .with_state(reader)
//!     .merge(auth_routes(config, registrar));
//!
//! // 4. Require a session in handlers
//! async fn home(AuthSession(session): AuthSession) -> String { /* ... */ }
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;

pub use config::{AuthConfig, DEFAULT_AUTH_PATH, DEFAULT_PUBLIC_URL, DEFAULT_SIGN_IN_PAGE};
pub use error::AuthError;
pub use extractor::{AuthSession, SessionReader, resolve_session};
pub use routes::auth_routes;
