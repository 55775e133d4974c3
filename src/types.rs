use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Backend-assigned user identifier.
///
/// The backend may answer with a string or a number; both are normalized
/// to their string form so the session only ever carries strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract a usable id from a backend JSON value.
    ///
    /// `null`, empty strings, zero and non-scalar values are not ids.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            serde_json::Value::Number(n) if n.as_f64() != Some(0.0) => {
                // Integral floats (`42.0`) print without the fraction.
                let text = match (n.as_i64(), n.as_u64(), n.as_f64()) {
                    (Some(i), _, _) => i.to_string(),
                    (None, Some(u), _) => u.to_string(),
                    (None, None, Some(f)) => f.to_string(),
                    (None, None, None) => n.to_string(),
                };
                Some(Self(text))
            }
            _ => None,
        }
    }
}

/// Provider subject identifier (OIDC `sub` claim).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SubjectId(pub String);

/// Identity assertion from the provider's userinfo endpoint.
///
/// Transient: consumed by token enrichment at sign-in, never stored as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Identity {
    #[serde(default)]
    pub sub: Option<SubjectId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(SubjectId(sub.into()));
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_given_name(mut self, given_name: impl Into<String>) -> Self {
        self.given_name = Some(given_name.into());
        self
    }

    #[must_use]
    pub fn with_family_name(mut self, family_name: impl Into<String>) -> Self {
        self.family_name = Some(family_name.into());
        self
    }

    #[must_use]
    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }

    /// Given and family name, falling back to splitting `name` on its first space.
    ///
    /// Missing parts come back as empty strings, which is what the backend expects.
    #[must_use]
    pub fn split_name(&self) -> (String, String) {
        let (fallback_given, fallback_family) = match self.name.as_deref() {
            Some(full) => match full.split_once(' ') {
                Some((given, family)) => (given, family),
                None => (full, ""),
            },
            None => ("", ""),
        };

        let given = non_empty(self.given_name.as_deref()).unwrap_or(fallback_given);
        let family = non_empty(self.family_name.as_deref()).unwrap_or(fallback_family);
        (given.to_owned(), family.to_owned())
    }
}

/// Provider account data from the token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ProviderAccount {
    pub provider: String,
    pub access_token: Option<String>,
    pub id_token: Option<String>,
}

impl ProviderAccount {
    #[must_use]
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            access_token: None,
            id_token: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(token.into());
        self
    }
}

/// Outcome of registering a user with the backend.
///
/// Failures are values, not errors: callers match on the variant and
/// carry on with sign-in either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Registered { id: UserId },
    Failed { reason: String },
}

impl Registration {
    pub(crate) fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// The backend id, if registration succeeded.
    #[must_use]
    pub fn id(&self) -> Option<&UserId> {
        match self {
            Self::Registered { id } => Some(id),
            Self::Failed { .. } => None,
        }
    }

    /// The failure reason, if registration failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Registered { .. } => None,
            Self::Failed { reason } => Some(reason),
        }
    }

    /// JSON mirror of the result: `{"id": ...}` or `{"id": null, "error": ...}`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Registered { id } => serde_json::json!({ "id": id }),
            Self::Failed { reason } => serde_json::json!({ "id": null, "error": reason }),
        }
    }
}

pub(crate) fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_name_on_first_space() {
        let identity = Identity::new().with_name("Jane Q Doe");
        assert_eq!(identity.split_name(), ("Jane".into(), "Q Doe".into()));
    }

    #[test]
    fn split_name_prefers_explicit_parts() {
        let identity = Identity::new()
            .with_name("Jane Q Doe")
            .with_given_name("Janet")
            .with_family_name("Smith");
        assert_eq!(identity.split_name(), ("Janet".into(), "Smith".into()));
    }

    #[test]
    fn split_name_single_word_and_missing() {
        let single = Identity::new().with_name("Cher");
        assert_eq!(single.split_name(), ("Cher".into(), String::new()));

        let none = Identity::new();
        assert_eq!(none.split_name(), (String::new(), String::new()));
    }

    #[test]
    fn split_name_treats_empty_parts_as_missing() {
        let identity = Identity::new().with_name("Ada Lovelace").with_given_name("");
        assert_eq!(identity.split_name(), ("Ada".into(), "Lovelace".into()));
    }

    #[test]
    fn user_id_from_json() {
        assert_eq!(UserId::from_json(&json!("42")), Some(UserId("42".into())));
        assert_eq!(UserId::from_json(&json!(42)), Some(UserId("42".into())));
        assert_eq!(UserId::from_json(&json!(null)), None);
        assert_eq!(UserId::from_json(&json!("")), None);
        assert_eq!(UserId::from_json(&json!(0)), None);
        assert_eq!(UserId::from_json(&json!(0.0)), None);
        assert_eq!(UserId::from_json(&json!(42.0)), Some(UserId("42".into())));
        assert_eq!(UserId::from_json(&json!(-7)), Some(UserId("-7".into())));
        assert_eq!(UserId::from_json(&json!(1.5)), Some(UserId("1.5".into())));
        assert_eq!(UserId::from_json(&json!({"id": 1})), None);
    }

    #[test]
    fn registration_json_mirror() {
        let ok = Registration::Registered {
            id: UserId("7".into()),
        };
        assert_eq!(ok.to_json(), json!({"id": "7"}));
        assert!(ok.to_json().get("error").is_none());

        let failed = Registration::failed("boom");
        assert_eq!(failed.to_json(), json!({"id": null, "error": "boom"}));
        assert_eq!(failed.error(), Some("boom"));
        assert!(failed.id().is_none());
    }

    #[test]
    fn identity_deserializes_google_userinfo() {
        let identity: Identity = serde_json::from_value(json!({
            "sub": "1100",
            "email": "a@b.com",
            "email_verified": true,
            "name": "Jane Doe",
            "picture": "https://example.com/p.png"
        }))
        .unwrap();
        assert_eq!(identity.sub, Some(SubjectId("1100".into())));
        assert_eq!(identity.email.as_deref(), Some("a@b.com"));
        assert!(identity.given_name.is_none());
    }
}
