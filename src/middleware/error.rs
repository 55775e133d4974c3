use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

/// Authentication errors for the route layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No valid session; the user is sent to the sign-in page.
    #[error("Sign-in required")]
    SignInRequired { sign_in_page: String },

    /// Sign-in flow failure; the user is sent back to the sign-in page with
    /// `?error=<code>`.
    #[error("OAuth error: {code}")]
    OAuth { sign_in_page: String, code: String },

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::SignInRequired { sign_in_page } => Redirect::to(&sign_in_page).into_response(),
            Self::OAuth { sign_in_page, code } => {
                let encoded = urlencoding::encode(&code);
                Redirect::to(&format!("{sign_in_page}?error={encoded}")).into_response()
            }
            Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

// Crate errors only reach this layer while building the config.
impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::Config(msg) => Self::Config(msg),
            other => Self::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::LOCATION;

    use super::*;

    #[test]
    fn sign_in_required_redirects() {
        let response = AuthError::SignInRequired {
            sign_in_page: "/login".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login");
    }

    #[test]
    fn oauth_error_is_encoded_into_redirect() {
        let response = AuthError::OAuth {
            sign_in_page: "/login".into(),
            code: "state mismatch".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login?error=state%20mismatch");
    }

    #[test]
    fn oauth_error_uses_its_own_sign_in_page() {
        let response = AuthError::OAuth {
            sign_in_page: "/auth/signin".into(),
            code: "access_denied".into(),
        }
        .into_response();
        assert_eq!(response.headers()[LOCATION], "/auth/signin?error=access_denied");
    }

    #[test]
    fn config_error_is_internal() {
        let response = AuthError::Config("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn crate_config_error_stays_config() {
        let err: AuthError = crate::error::Error::Config("x".into()).into();
        assert!(matches!(err, AuthError::Config(_)));
        let err: AuthError = crate::error::Error::Token("bad".into()).into();
        assert!(matches!(err, AuthError::Config(msg) if msg.contains("bad")));
    }
}
