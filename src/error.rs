//! Error types for the gconnector crate.
//!
//! [`TransportError`] describes what went wrong talking to Google.
//! [`ConnectorError`] is what callers of [`Connector`](crate::Connector)
//! see: one kind per operation, with the transport failure kept as the
//! source.

use std::path::PathBuf;

use thiserror::Error;

/// Raw failures from the HTTP/auth layer.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JWT encoding error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Unknown API service: {0}")]
    UnknownService(String),

    #[error("Operation requires the {expected} API but the session is bound to {actual}")]
    WrongService {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("File name is not valid UTF-8: {}", .0.display())]
    InvalidFileName(PathBuf),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Download stalled at byte {offset}")]
    StalledDownload { offset: u64 },
}

/// Errors surfaced by [`Connector`](crate::Connector) operations.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Authentication type '{0}' is not allowed")]
    BadAuthMode(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(#[source] TransportError),

    #[error("The file '{}' cannot be found", .0.display())]
    MissingFile(PathBuf),

    #[error("Listing files failed: {0}")]
    ListFailed(#[source] TransportError),

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] TransportError),

    #[error("Download failed: {0}")]
    DownloadFailed(#[source] TransportError),

    #[error("Sheet export failed: {0}")]
    SheetExportFailed(#[source] TransportError),

    #[error("Reparent failed: {0}")]
    ReparentFailed(#[source] TransportError),
}

/// Result type alias for ConnectorError.
pub type Result<T> = std::result::Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_source_is_preserved() {
        let err = ConnectorError::UploadFailed(TransportError::Api {
            status: 403,
            message: "insufficient permissions".to_string(),
        });

        let source = err.source().expect("source should be chained");
        assert!(source.to_string().contains("403"));
        assert!(err.to_string().starts_with("Upload failed"));
    }

    #[test]
    fn test_missing_file_display() {
        let err = ConnectorError::MissingFile(PathBuf::from("a/b/report.csv"));
        assert_eq!(err.to_string(), "The file 'a/b/report.csv' cannot be found");
    }
}
