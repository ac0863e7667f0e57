//! Entries in the run's append-only output log.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Text,
    Success,
    Warning,
    Error,
    Debug,
    Json,
}

/// One line (or block) of user-facing output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputEntry {
    pub kind: OutputKind,
    pub text: String,
}

impl OutputEntry {
    pub fn new(kind: OutputKind, text: impl Into<String>) -> Self {
        OutputEntry {
            kind,
            text: text.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(OutputKind::Text, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(OutputKind::Success, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(OutputKind::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(OutputKind::Error, text)
    }

    pub fn debug(text: impl Into<String>) -> Self {
        Self::new(OutputKind::Debug, text)
    }

    /// Pretty-printed JSON of `value`.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(OutputKind::Json, serde_json::to_string_pretty(value)?))
    }
}
