//! Structured, serializable error payloads.
//!
//! Manager errors stay typed inside the crate. Anything that crosses the
//! plugin boundary is rendered through [`IntoErrorPayload`] so the transport
//! layer can ship `{code, title, message, suggestions}` without knowing the
//! error types.

use serde::{Deserialize, Serialize};

/// Wire-friendly error description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Stable snake_case identifier (e.g. `connection_not_found`).
    pub code: String,
    /// Short human readable headline.
    pub title: String,
    /// Full error message.
    pub message: String,
    /// Hints for resolving the error. May be empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ErrorPayload {
    pub fn new(code: &str, title: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            title: title.to_string(),
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Render as a JSON value for the transport layer.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code,
                "title": self.title,
                "message": self.message,
                "suggestions": self.suggestions,
            }
        })
    }
}

/// Conversion of a crate error into its structured payload.
pub trait IntoErrorPayload {
    fn error_code(&self) -> &'static str;

    fn to_payload(&self) -> ErrorPayload;
}

impl IntoErrorPayload for anyhow::Error {
    fn error_code(&self) -> &'static str {
        "backend_error"
    }

    fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.error_code(), "Backend error", format!("{:#}", self))
    }
}
