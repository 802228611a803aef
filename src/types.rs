use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;
use crate::tenant::normalize_company_name;

/// Bearer credential attached to every authenticated request.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Long-lived credential exchanged for a new [`AccessToken`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl RefreshToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshToken(..)")
    }
}

impl From<&str> for RefreshToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Tokens issued by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: Option<RefreshToken>,
}

/// Normalized tenant identifier (ASCII lowercase letters and digits only).
///
/// Guaranteed normalized by construction. Use [`CompanyName::normalize`] for
/// user input; `TryFrom<String>` only accepts already-normalized values, which
/// is what the credential store holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompanyName(String);

impl CompanyName {
    /// Normalizes a user-entered company name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDomain`] if nothing alphanumeric is left.
    pub fn normalize(raw: &str) -> Result<Self, Error> {
        let normalized = normalize_company_name(raw);
        if normalized.is_empty() {
            return Err(Error::InvalidDomain {
                company: raw.to_owned(),
                detail: "a company name needs at least one letter or digit".into(),
            });
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CompanyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CompanyName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if !s.is_empty() && normalize_company_name(&s) == s {
            Ok(Self(s))
        } else {
            Err(Error::InvalidDomain {
                company: s,
                detail: "not a normalized company identifier".into(),
            })
        }
    }
}

impl From<CompanyName> for String {
    fn from(c: CompanyName) -> Self {
        c.0
    }
}

/// Backend user identifier; numeric on most deployments, string on some.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Dashboard user as returned by login and `/users/users/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub is_staff: Option<bool>,
    /// Remaining backend-defined fields (groups, permissions, company, ...).
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AuthenticatedUser {
    pub user: User,
    pub access_token: AccessToken,
}

/// Login endpoint response body.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(not(feature = "client"), allow(dead_code))]
pub(crate) struct LoginResponse {
    pub(crate) user: User,
    #[serde(alias = "access")]
    pub(crate) access_token: AccessToken,
    #[serde(default, alias = "refresh")]
    pub(crate) refresh_token: Option<RefreshToken>,
}

#[cfg_attr(not(feature = "client"), allow(dead_code))]
impl LoginResponse {
    pub(crate) fn into_parts(self) -> (AuthenticatedUser, TokenPair) {
        let tokens = TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token,
        };
        let user = AuthenticatedUser {
            user: self.user,
            access_token: self.access_token,
        };
        (user, tokens)
    }
}

/// Paginated list envelope used by the fleet list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}
