/// Error taxonomy, error log entries and the log-and-continue wrapper
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NovaTabError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Bookmarks error: {0}")]
    Bookmarks(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage quota exceeded. Please export your data and reset settings.")]
    QuotaExceeded,
    #[error("Invalid image URL. Please use http://, https://, or data:image/* URLs only.")]
    InvalidImageUrl,
    #[error("Please enter a valid URL starting with http:// or https://")]
    InvalidUrl,
    #[error("Missing required data: {0}")]
    MissingField(String),
    #[error("Category not found: {0}")]
    CategoryNotFound(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("{0}")]
    Runtime(String),
}

impl NovaTabError {
    /// Machine-readable category, stored alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            NovaTabError::Storage(_) => "STORAGE_ERROR",
            NovaTabError::Bookmarks(_) => "BOOKMARKS_ERROR",
            NovaTabError::Serialization(_) => "INVALID_JSON",
            NovaTabError::QuotaExceeded => "QUOTA_EXCEEDED",
            NovaTabError::InvalidImageUrl => "INVALID_IMAGE_URL",
            NovaTabError::InvalidUrl => "INVALID_URL",
            NovaTabError::MissingField(_) => "MISSING_DATA",
            NovaTabError::CategoryNotFound(_) => "NOT_FOUND",
            NovaTabError::Configuration(_) => "CONFIGURATION_ERROR",
            NovaTabError::Runtime(_) => "UNKNOWN_ERROR",
        }
    }
}

impl From<serde_json::Error> for NovaTabError {
    fn from(err: serde_json::Error) -> Self {
        NovaTabError::Serialization(err.to_string())
    }
}

/// One persisted diagnostics record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogEntry {
    pub message: String,
    #[serde(default)]
    pub code: String,
    pub context: String,
    #[serde(default)]
    pub details: Value,
    /// Milliseconds since the epoch
    pub timestamp: f64,
    pub version: String,
}

/// Sink for errors that are handled by logging them
///
/// Implementations must never fail or panic; reporting is best effort.
#[allow(async_fn_in_trait)]
pub trait ErrorReporter {
    async fn log_error(&self, error: &NovaTabError, context: &str, details: Value);
}

/// Run a fallible operation, logging a failure and returning `None` instead
pub async fn safe_async<T, F, R>(reporter: &R, context: &str, operation: F) -> Option<T>
where
    F: Future<Output = Result<T, NovaTabError>>,
    R: ErrorReporter,
{
    match operation.await {
        Ok(value) => Some(value),
        Err(err) => {
            reporter.log_error(&err, context, Value::Null).await;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingReporter;

    #[test]
    fn test_error_codes() {
        assert_eq!(NovaTabError::QuotaExceeded.code(), "QUOTA_EXCEEDED");
        assert_eq!(NovaTabError::Storage("x".to_string()).code(), "STORAGE_ERROR");
        assert_eq!(NovaTabError::Runtime("x".to_string()).code(), "UNKNOWN_ERROR");
    }

    #[test]
    fn test_from_serde_error() {
        let err: NovaTabError = serde_json::from_str::<Value>("{not json").unwrap_err().into();
        assert_eq!(err.code(), "INVALID_JSON");
    }

    #[test]
    fn test_error_log_entry_serialization() {
        let entry = ErrorLogEntry {
            message: "boom".to_string(),
            code: "UNKNOWN_ERROR".to_string(),
            context: "test".to_string(),
            details: Value::Null,
            timestamp: 1698508200000.0,
            version: "1.1.1".to_string(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        let deserialized: ErrorLogEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, entry);
    }

    #[tokio::test]
    async fn test_safe_async_success() {
        let reporter = RecordingReporter::default();

        let result = safe_async(&reporter, "ok", async { Ok::<_, NovaTabError>(5) }).await;

        assert_eq!(result, Some(5));
        assert!(reporter.contexts().is_empty());
    }

    #[tokio::test]
    async fn test_safe_async_logs_and_returns_none() {
        let reporter = RecordingReporter::default();

        let result: Option<u32> = safe_async(&reporter, "fetch", async {
            Err(NovaTabError::Bookmarks("gone".to_string()))
        })
        .await;

        assert_eq!(result, None);
        assert_eq!(reporter.contexts(), vec!["fetch".to_string()]);
    }
}
