//! Error types for flighttracker.
//!
//! This module defines the crate-wide error type. Component-local errors
//! (bounding box parsing, per-field decode diagnostics, scheduler lifecycle)
//! live next to the component and convert into [`Error`] where they cross a
//! module boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::bbox::BboxError;

/// The main error type for flighttracker operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to render configuration as TOML.
    #[error("failed to render configuration: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    /// The bounding box string could not be parsed.
    #[error("invalid bounding box: {0}")]
    BoundingBox(#[from] BboxError),

    // === Feed Errors ===
    /// The feed could not be reached (DNS, connection refused, timeout).
    #[error("feed transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The feed answered with a non-success status code.
    #[error("feed returned status {status} for {url}")]
    FetchStatus {
        /// HTTP status code returned by the feed.
        status: u16,
        /// The requested URL.
        url: String,
    },

    // === Decoding Errors ===
    /// The feed payload is not a JSON object.
    #[error("malformed feed payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    // === Sink Errors ===
    /// A sink was used before `init` was called.
    #[error("{sink} sink used before initialisation")]
    SinkNotInitialized {
        /// Name of the sink.
        sink: &'static str,
    },

    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Search Errors ===
    /// A search time bound did not match `YYYY-MM-DDTHH:MM:SS`.
    #[error("invalid timestamp '{value}', expected YYYY-MM-DDTHH:MM:SS: {source}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// The underlying parse error.
        #[source]
        source: chrono::ParseError,
    },

    /// A search parameter was missing or not usable.
    #[error("invalid search parameter '{name}': {message}")]
    InvalidParameter {
        /// The parameter name as the caller spelled it.
        name: &'static str,
        /// What was wrong with it.
        message: String,
    },

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for flighttracker operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

/// Request-time failures. Client construction is mapped separately.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error is a setup-time configuration problem.
    ///
    /// Configuration errors are fatal; everything else is scoped to a cycle
    /// or a request.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad(_)
                | Self::ConfigRender(_)
                | Self::ConfigValidation { .. }
                | Self::BoundingBox(_)
        )
    }

    /// Create an invalid search parameter error.
    #[must_use]
    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// Check if this error is caused by bad caller input to a search.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::BoundingBox(_) | Self::InvalidTimestamp { .. } | Self::InvalidParameter { .. }
        )
    }

    /// Check if this error came from talking to the feed.
    #[must_use]
    pub fn is_feed_error(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::FetchStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::internal("boom");
        assert_eq!(err.to_string(), "internal error: boom");

        let err = Error::config("refresh_secs must be greater than 0");
        assert_eq!(
            err.to_string(),
            "invalid configuration: refresh_secs must be greater than 0"
        );
    }

    #[test]
    fn test_fetch_status_display() {
        let err = Error::FetchStatus {
            status: 503,
            url: "http://feed.test/feed.js".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("http://feed.test/feed.js"));
        assert!(err.is_feed_error());
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_bbox_error_is_configuration_error() {
        let bbox_err = "1,2".parse::<crate::bbox::BoundingBox>().unwrap_err();
        let err: Error = bbox_err.into();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("invalid bounding box"));
    }

    #[test]
    fn test_sink_not_initialized_display() {
        let err = Error::SinkNotInitialized { sink: "file" };
        assert_eq!(err.to_string(), "file sink used before initialisation");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_invalid_timestamp_display() {
        let source = chrono::NaiveDateTime::parse_from_str("yesterday", "%Y-%m-%dT%H:%M:%S")
            .unwrap_err();
        let err = Error::InvalidTimestamp {
            value: "yesterday".to_string(),
            source,
        };
        assert!(err.to_string().contains("yesterday"));
        assert!(err.to_string().contains("YYYY-MM-DDTHH:MM:SS"));
    }

    #[test]
    fn test_invalid_parameter_is_validation_error() {
        let err = Error::invalid_parameter("altThresholdFeet", "missing");
        assert_eq!(
            err.to_string(),
            "invalid search parameter 'altThresholdFeet': missing"
        );
        assert!(err.is_validation_error());
        assert!(!Error::internal("x").is_validation_error());
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
