//! Structured errors for API operations.
//!
//! Every failure path maps to one [`ApiError`] kind so callers can branch on
//! semantics (blocked account vs. field validation vs. plain HTTP failure)
//! instead of string-matching.

use std::fmt;

use serde_json::Value;

/// One per-field message from a server validation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Error categories for API operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Client-side validation failure. Resolved locally, never dispatched.
    Validation { field: String, message: String },
    /// 403 whose body marks the account as blocked. Forces logout.
    BlockedAccount,
    /// Non-2xx response not otherwise classified.
    Http { status: u16, message: String },
    /// Structured per-field server validation payload (register/create).
    Fields(Vec<FieldError>),
    /// Connection or decode failure; no usable HTTP status.
    Transport(String),
    /// A bulk operation where only part of the sub-requests succeeded.
    /// Already-applied server-side mutations are kept.
    Batch { succeeded: usize, attempted: usize },
}

impl ApiError {
    /// Creates a client-side validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport(message.into())
    }

    /// Classifies a non-2xx response from its status and decoded body.
    ///
    /// A 400 whose body carries per-field messages becomes [`ApiError::Fields`];
    /// anything else becomes [`ApiError::Http`] with the message extracted
    /// from the `detail`/`message` body keys when present.
    pub fn from_response(status: u16, body: &Value) -> Self {
        if status == 400 {
            let fields = collect_field_errors(body);
            if !fields.is_empty() {
                return ApiError::Fields(fields);
            }
        }
        ApiError::Http {
            status,
            message: body_message(body).unwrap_or_else(|| format!("HTTP {status}")),
        }
    }

    /// Returns the HTTP status, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::BlockedAccount => Some(403),
            ApiError::Fields(_) => Some(400),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation { field, message } => write!(f, "{field}: {message}"),
            ApiError::BlockedAccount => {
                write!(f, "Your account is blocked. Please contact support.")
            }
            ApiError::Http { message, .. } => write!(f, "{message}"),
            ApiError::Fields(fields) => {
                let joined = fields
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "{joined}")
            }
            ApiError::Transport(message) => write!(f, "{message}"),
            ApiError::Batch {
                succeeded,
                attempted,
            } => write!(f, "{succeeded} of {attempted} succeeded"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Transport(format!("request timed out: {err}"))
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Extracts a display message from a `{detail?, message?}` error body.
pub(crate) fn body_message(body: &Value) -> Option<String> {
    for key in ["detail", "message"] {
        if let Some(text) = body.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    None
}

/// Returns true when a 403 body marks the account as blocked.
///
/// Case-insensitive substring match on the message field, per the server's
/// contract ("Blocked user account", "This account is blocked", ...).
pub(crate) fn is_blocked_payload(body: &Value) -> bool {
    body_message(body).is_some_and(|message| message.to_ascii_lowercase().contains("blocked"))
}

/// Collects `{<field>: string|[string], non_field_errors: [string]}` entries.
fn collect_field_errors(body: &Value) -> Vec<FieldError> {
    let Some(map) = body.as_object() else {
        return Vec::new();
    };
    let mut fields = Vec::new();
    for (key, value) in map {
        if key == "detail" || key == "message" {
            continue;
        }
        let message = match value {
            Value::String(text) => Some(text.clone()),
            Value::Array(items) => {
                let texts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                if texts.is_empty() {
                    None
                } else {
                    Some(texts.join(" "))
                }
            }
            _ => None,
        };
        if let Some(message) = message {
            fields.push(FieldError {
                field: key.clone(),
                message,
            });
        }
    }
    fields
}

/// The `{status, message}` snapshot a store keeps after a rejected
/// operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub status: Option<u16>,
    pub message: String,
}

impl From<&ApiError> for StoreError {
    fn from(err: &ApiError) -> Self {
        StoreError {
            status: err.status(),
            message: err.to_string(),
        }
    }
}
