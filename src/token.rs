use std::sync::Arc;

use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::V4;
use pasetors::{Local, local};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::Error;
use crate::session::SessionToken;

const KEY_LABEL: &[u8] = b"sensai-auth session token v1\0";
// Binds tokens to this use; a token sealed for anything else fails to open.
const IMPLICIT_ASSERTION: &[u8] = b"sensai-session";

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default session lifetime, renewed on every read.
pub const DEFAULT_MAX_AGE: std::time::Duration = std::time::Duration::from_secs(30 * 24 * 60 * 60);

/// A token that passed decryption and claim validation.
#[derive(Debug, Clone)]
pub struct OpenedToken {
    pub token: SessionToken,
    pub expires: OffsetDateTime,
}

/// Seals and opens session tokens as PASETO `v4.local` (encrypted + authenticated).
#[derive(Clone)]
pub struct TokenCodec {
    key: Arc<SymmetricKey<V4>>,
    max_age: std::time::Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Derive the sealing key from the application secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the secret is shorter than [`MIN_SECRET_LEN`].
    pub fn from_secret(secret: &[u8]) -> Result<Self, Error> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::Config(format!(
                "session secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }
        let digest = Sha256::new()
            .chain_update(KEY_LABEL)
            .chain_update(secret)
            .finalize();
        let key = SymmetricKey::<V4>::from(digest.as_slice())
            .map_err(|e| Error::Config(format!("session key: {e}")))?;

        Ok(Self {
            key: Arc::new(key),
            max_age: DEFAULT_MAX_AGE,
        })
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: std::time::Duration) -> Self {
        self.max_age = max_age;
        self
    }

    #[must_use]
    pub fn max_age(&self) -> std::time::Duration {
        self.max_age
    }

    /// Seal a token with a fresh `iat`/`nbf`/`exp` window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if claims cannot be built or encryption fails.
    pub fn seal(&self, token: &SessionToken) -> Result<String, Error> {
        let mut claims = Claims::new_expires_in(&self.max_age).map_err(token_error)?;

        let fields = match serde_json::to_value(token) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => return Err(Error::Token("session token is not an object".into())),
            Err(e) => return Err(Error::Token(e.to_string())),
        };
        for (name, value) in fields {
            if name == "sub" {
                if let Some(sub) = value.as_str().filter(|s| !s.is_empty()) {
                    claims.subject(sub).map_err(token_error)?;
                }
                continue;
            }
            claims.add_additional(&name, value).map_err(token_error)?;
        }

        local::encrypt(&self.key, &claims, None, Some(IMPLICIT_ASSERTION)).map_err(token_error)
    }

    /// Decrypt and validate a sealed token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the token is malformed, was sealed with
    /// another key, or has expired.
    pub fn open(&self, sealed: &str) -> Result<OpenedToken, Error> {
        let untrusted = UntrustedToken::<Local, V4>::try_from(sealed).map_err(token_error)?;
        let rules = ClaimsValidationRules::new();
        let trusted = local::decrypt(&self.key, &untrusted, &rules, None, Some(IMPLICIT_ASSERTION))
            .map_err(token_error)?;

        let claims = trusted
            .payload_claims()
            .ok_or_else(|| Error::Token("missing payload".into()))?;

        let expires = claims
            .get_claim("exp")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Token("missing claim: exp".into()))
            .and_then(|exp| {
                OffsetDateTime::parse(exp, &Rfc3339).map_err(|e| Error::Token(e.to_string()))
            })?;

        let payload = claims.to_string().map_err(token_error)?;
        let token: SessionToken =
            serde_json::from_str(&payload).map_err(|e| Error::Token(e.to_string()))?;

        Ok(OpenedToken { token, expires })
    }

    /// Open a token and seal it again with a renewed expiry.
    ///
    /// # Errors
    ///
    /// Fails like [`open`](Self::open) and [`seal`](Self::seal).
    pub fn reseal(&self, sealed: &str) -> Result<(String, OpenedToken), Error> {
        let opened = self.open(sealed)?;
        let renewed = self.seal(&opened.token)?;
        let opened = self.open(&renewed)?;
        Ok((renewed, opened))
    }
}

fn token_error(e: pasetors::errors::Error) -> Error {
    Error::Token(e.to_string())
}
