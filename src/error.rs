//! Error types for pyissues.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=metadata, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Per-item fetch failures are not represented here: they are absorbed by
//! the fetch layer (see [`crate::remote::FetchError`]) and only surface as
//! a shortfall between requested and fetched counts.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::IssueId;

/// Result type alias for pyissues operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Metadata (exit 2)
    MetadataNotFound,
    MalformedMetadata,
    InvalidStatus,

    // Not Found (exit 3)
    ArchiveNotFound,
    IssueNotFound,

    // Validation (exit 4)
    InvalidArgument,

    // Archive (exit 5)
    MalformedContainer,
    ParseFailure,

    // Network (exit 6)
    NetworkError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Interrupted (exit 130)
    Cancelled,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::MetadataNotFound => "METADATA_NOT_FOUND",
            Self::MalformedMetadata => "MALFORMED_METADATA",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::ArchiveNotFound => "ARCHIVE_NOT_FOUND",
            Self::IssueNotFound => "ISSUE_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::MalformedContainer => "MALFORMED_CONTAINER",
            Self::ParseFailure => "PARSE_FAILURE",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::MetadataNotFound | Self::MalformedMetadata | Self::InvalidStatus => 2,
            Self::ArchiveNotFound | Self::IssueNotFound => 3,
            Self::InvalidArgument => 4,
            Self::MalformedContainer | Self::ParseFailure => 5,
            Self::NetworkError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::Cancelled => 130,
        }
    }

    /// Whether running the same command again may succeed without any
    /// change to the local files.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Cancelled)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in pyissues operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Metadata file not found: {}", path.display())]
    MetadataNotFound { path: PathBuf },

    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("Invalid status code {code} for issue {id}")]
    InvalidStatus { id: IssueId, code: i64 },

    #[error("Archive file not found: {}", path.display())]
    ArchiveNotFound { path: PathBuf },

    #[error("Issue not found in archive: {id}")]
    IssueNotFound { id: IssueId },

    #[error("Malformed archive container: {0}")]
    MalformedContainer(String),

    #[error("Failed to parse document: {0}")]
    Parse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MetadataNotFound { .. } => ErrorCode::MetadataNotFound,
            Self::MalformedMetadata(_) => ErrorCode::MalformedMetadata,
            Self::InvalidStatus { .. } => ErrorCode::InvalidStatus,
            Self::ArchiveNotFound { .. } => ErrorCode::ArchiveNotFound,
            Self::IssueNotFound { .. } => ErrorCode::IssueNotFound,
            Self::MalformedContainer(_) => ErrorCode::MalformedContainer,
            Self::Parse(_) => ErrorCode::ParseFailure,
            Self::Http(_) => ErrorCode::NetworkError,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::MetadataNotFound { path } => Some(format!(
                "No metadata at {}. Run `pyissues rebuild` to fetch the issue list and all issues.",
                path.display()
            )),
            Self::ArchiveNotFound { path } => Some(format!(
                "No archive at {}. Run `pyissues rebuild` or `pyissues refetch` first.",
                path.display()
            )),
            Self::MalformedMetadata(_) => Some(
                "The metadata file is damaged. `pyissues rebuild` replaces it with a fresh snapshot."
                    .to_string(),
            ),
            Self::InvalidStatus { .. } => Some(
                "Valid status codes: 1 (open), 2 (closed), 3 (pending), 4 (languishing)".to_string(),
            ),
            Self::IssueNotFound { .. } => Some(
                "The issue may have failed to fetch. `pyissues fix` refetches missing issues."
                    .to_string(),
            ),
            Self::MalformedContainer(_) => Some(
                "Archives written with --raw-text must be read with --raw-text as well.".to_string(),
            ),
            Self::Cancelled => Some("Nothing was written; local files are unchanged.".to_string()),
            Self::Http(_) => Some("Check the network connection or --base-url.".to_string()),

            Self::Parse(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::InvalidStatus { id: 1, code: 9 }.exit_code(), 2);
        assert_eq!(Error::IssueNotFound { id: 3 }.exit_code(), 3);
        assert_eq!(Error::MalformedContainer("x".into()).exit_code(), 5);
        assert_eq!(Error::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::MetadataNotFound {
            path: PathBuf::from("/tmp/meta.json"),
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "METADATA_NOT_FOUND");
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"]["hint"].as_str().unwrap().contains("rebuild"));
    }

    #[test]
    fn test_structured_json_without_hint() {
        let json = Error::Other("boom".into()).to_structured_json();
        assert_eq!(json["error"]["message"], "boom");
        assert!(json["error"].get("hint").is_none());
    }
}
