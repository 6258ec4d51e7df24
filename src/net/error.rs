//! Normalized gateway failures.
//!
//! Every API call fails with a [`RequestError`] whose `Display` is the message
//! the UI shows. Field-validation failures (HTTP 422 with an `errors` map)
//! flatten every field message into one string so no detail is lost.

use std::collections::BTreeMap;

use serde_json::Value;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const VALIDATION_STATUS: u16 = 422;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The request never produced an HTTP response.
    #[error("{message}")]
    Transport { message: String },

    /// Bad credentials or an expired/invalid bearer token.
    #[error("{message}")]
    Unauthorized { status: u16, message: String },

    /// Per-field validation failure. `message` joins every field message.
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    /// Any other non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// A success response whose body did not match the expected shape.
    #[error("unexpected response from server: {0}")]
    Decode(String),

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,
}

impl RequestError {
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Validation { .. } => Some(VALIDATION_STATUS),
            _ => None,
        }
    }

    /// Field name to messages, present only for validation failures.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        Self::Transport { message: format!("network request failed: {err}") }
    }

    /// Map a non-success status and its raw body to a typed error.
    ///
    /// `fallback` is the operation-specific message used when the body
    /// carries no `message` of its own (or is not JSON at all).
    pub(crate) fn from_response(status: u16, body: &str, fallback: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).unwrap_or(Value::Null);

        if status == VALIDATION_STATUS {
            let fields = lenient_field_errors(parsed.get("errors"));
            if !fields.is_empty() {
                return Self::Validation { message: flatten_field_errors(&fields), fields };
            }
        }

        let message = parsed
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map_or_else(|| fallback.to_owned(), str::to_owned);

        match status {
            401 | 403 => Self::Unauthorized { status, message },
            _ => Self::Status { status, message },
        }
    }
}

/// Field map from an `errors` object. A bare string counts as a one-message
/// list; non-string entries are skipped.
fn lenient_field_errors(errors: Option<&Value>) -> FieldErrors {
    let Some(Value::Object(map)) = errors else {
        return FieldErrors::new();
    };
    map.iter()
        .filter_map(|(field, value)| {
            let messages: Vec<String> = match value {
                Value::String(message) => vec![message.clone()],
                Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_owned).collect(),
                _ => Vec::new(),
            };
            (!messages.is_empty()).then(|| (field.clone(), messages))
        })
        .collect()
}

/// Join every field message, in field order, with `", "`.
#[must_use]
pub fn flatten_field_errors(fields: &FieldErrors) -> String {
    fields
        .values()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
