use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Transport,
    Render,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorContext {
    Preview,
    Handler,
    Import,
    Edit,
}

/// A user-visible notification. Nothing in the editor is fatal; these are
/// shown and then superseded by the next successful exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{context:?}/{category:?}: {message}")]
pub struct DisplayError {
    category: ErrorCategory,
    context: ErrorContext,
    message: String,
}

impl DisplayError {
    pub fn new(category: ErrorCategory, context: ErrorContext, message: impl Into<String>) -> Self {
        Self {
            category,
            context,
            message: message.into(),
        }
    }

    pub fn from_message(context: ErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("connection")
            || lower.contains("connect")
            || lower.contains("network")
            || lower.contains("dns")
            || lower.contains("unavailable")
            || lower.contains("502")
            || lower.contains("503")
        {
            ErrorCategory::Transport
        } else if lower.contains("invalid")
            || lower.contains("malformed")
            || lower.contains("missing")
            || lower.contains("reserved")
            || lower.contains("expected")
        {
            ErrorCategory::Validation
        } else if lower.contains("render")
            || lower.contains("applet")
            || lower.contains("decoding image")
        {
            ErrorCategory::Render
        } else {
            ErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.category == ErrorCategory::Transport
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn context(&self) -> ErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
