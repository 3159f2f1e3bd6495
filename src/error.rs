use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeserializationErrorKind {
    MissingRequiredData,
    InvalidInputFormat,
    TypeMismatch,
}

impl fmt::Display for DeserializationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingRequiredData => "MissingRequiredData",
            Self::InvalidInputFormat => "InvalidInputFormat",
            Self::TypeMismatch => "TypeMismatch",
        };
        f.write_str(s)
    }
}

/// A response body that could not be turned into a domain record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("DeserializationError {{ details: \"{details}\", type: \"{kind}\" }}")]
pub struct DeserializationError {
    pub details: String,
    pub kind: DeserializationErrorKind,
}

impl DeserializationError {
    pub fn new(details: impl Into<String>, kind: DeserializationErrorKind) -> Self {
        Self {
            details: details.into(),
            kind,
        }
    }

    pub fn invalid_input(details: impl Into<String>) -> Self {
        Self::new(details, DeserializationErrorKind::InvalidInputFormat)
    }

    pub fn missing_field(key: &str) -> Self {
        Self::new(
            format!("Missing required '{key}' field"),
            DeserializationErrorKind::MissingRequiredData,
        )
    }

    pub fn type_mismatch(key: &str, expected: &str) -> Self {
        Self::new(
            format!("Expected value for '{key}' field to be {expected}"),
            DeserializationErrorKind::TypeMismatch,
        )
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: authorization credentials rejected")]
    Unauthorized,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid Concourse URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Deserialization(#[from] DeserializationError),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
