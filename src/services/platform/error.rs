//! Remote platform failure shapes
//!
//! `PlatformError` covers calls that did not produce usable data. Business
//! rejections (`userErrors`) arrive inside successful responses and are
//! returned as `UserError` values instead.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{label}: request failed: {source}")]
    Transport {
        label: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{label}: HTTP {status}: {body}")]
    Http { label: String, status: u16, body: String },

    #[error("{label}: malformed response: {detail}")]
    Malformed { label: String, detail: String },

    #[error("{label}: GraphQL error: {}", .messages.join("; "))]
    GraphQl { label: String, messages: Vec<String> },

    #[error("{label}: throttled after {attempts} attempts")]
    Throttled { label: String, attempts: u32 },
}

impl PlatformError {
    pub fn malformed(label: &str, detail: impl Into<String>) -> Self {
        PlatformError::Malformed {
            label: label.to_string(),
            detail: detail.into(),
        }
    }
}

/// Per-mutation business error
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub field: Option<Vec<String>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl UserError {
    pub fn new(code: Option<&str>, field: &[&str], message: &str) -> Self {
        Self {
            code: code.map(str::to_string),
            field: if field.is_empty() {
                None
            } else {
                Some(field.iter().map(|f| f.to_string()).collect())
            },
            message: Some(message.to_string()),
        }
    }
}

/// `[CODE] message (field.path)` for each error, joined with ` | `
pub fn format_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| {
            let mut text = String::new();
            if let Some(code) = &e.code {
                text.push_str(&format!("[{}] ", code));
            }
            text.push_str(e.message.as_deref().unwrap_or("Unknown error"));
            if let Some(field) = e.field.as_ref().filter(|f| !f.is_empty()) {
                text.push_str(&format!(" ({})", field.join(".")));
            }
            text
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
