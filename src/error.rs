use serde_json::Value as JsonValue;

/// Errors returned by the fleet API client.
///
/// The company-scoped variants render as user-facing messages, so their
/// `Display` output can be shown in a login dialog as-is.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// `login` was rejected by the backend.
    #[error("Authentication failed: {message}")]
    Authentication {
        status: u16,
        message: String,
        body: String,
    },

    #[error("We couldn't find a company named \"{company}\". Check the spelling and try again.")]
    CompanyNotFound { company: String },

    #[error("\"{company}\" is not a valid company domain: {detail}")]
    InvalidDomain { company: String, detail: String },

    #[error("Couldn't reach the server for \"{company}\". Check your connection and try again.")]
    ConnectionFailure { company: String, detail: String },

    #[error("Incorrect username or password for \"{company}\".")]
    InvalidCredentials { company: String },

    /// 403 from the backend. Never retried.
    #[error("{message}")]
    AccessDenied { message: String },

    /// The access token was rejected and could not be refreshed.
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    #[error("Request failed with status {status}: {message}")]
    Api {
        status: u16,
        message: String,
        body: String,
    },

    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status attached to the error, if the backend produced one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::AccessDenied { .. } => Some(403),
            Self::SessionExpired => Some(401),
            _ => None,
        }
    }
}

/// Pulls a human-readable message out of an error response body.
///
/// Knows the shapes the backend produces: `{"detail": ..}`, `{"message": ..}`,
/// `{"error": ..}`, `{"non_field_errors": [..]}` and per-field validation
/// errors. Falls back to the raw body when it is short plain text.
pub(crate) fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(json) = serde_json::from_str::<JsonValue>(trimmed) else {
        return (trimmed.len() <= 200 && !trimmed.starts_with('<')).then(|| trimmed.to_owned());
    };

    for key in ["detail", "message", "error", "non_field_errors"] {
        if let Some(message) = json.get(key).and_then(first_text) {
            return Some(message);
        }
    }

    json.as_object()
        .and_then(|fields| fields.values().find_map(first_text))
        .or_else(|| first_text(&json))
}

fn first_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}
