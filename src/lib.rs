use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod batch;
pub mod client;
pub mod config;
pub mod hitachi;
pub mod hubbell;
pub mod input;
pub mod scraper;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::ScraperConfig;
pub use types::{Dataset, ErrorEntry, Record, ScrapedPage, WriteMode};

/// The `ScraperError` enum represents the errors that can occur while scraping and persisting bushing data.
///
/// Per-item errors (everything produced while fetching or parsing a single identifier) are
/// recorded in the error log and never stop a batch. File-system and configuration errors
/// are fatal.
#[derive(Error, Debug)]
pub enum ScraperError {
    /// Represents an HTTP error that is neither a timeout nor a connection failure.
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// The request did not complete within the configured timeout.
    #[error("Request timeout after {} seconds: {url}", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },
    /// The server could not be reached.
    #[error("Network connection error: {0}")]
    ConnectionError(String),
    /// The server answered with a non-success status code.
    #[error("HTTP error {status}: {url}")]
    HttpStatus { status: u16, url: String },
    /// The body was empty or shorter than the minimum page length.
    #[error("Response too short or empty ({0} bytes)")]
    EmptyResponse(usize),
    /// The vendor page reported that the identifier does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The page loaded but the required key field could not be extracted.
    #[error("Content extraction failed: {0}")]
    ExtractionError(String),
    /// Represents an error returned by the Algolia search API.
    #[error("Search failed: {0}")]
    SearchError(String),
    /// A master list required by the requested operation does not exist.
    #[error("Master list not found: {}", .0.display())]
    MissingMasterList(PathBuf),
    /// No identifiers were provided or found.
    #[error("No identifiers to process: {0}")]
    NoIdentifiers(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

impl ScraperError {
    /// Classifies a transport error the way the error log reports it.
    pub fn from_transport(err: reqwest::Error, url: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            ScraperError::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else if err.is_connect() {
            ScraperError::ConnectionError(err.to_string())
        } else {
            ScraperError::RequestError(err)
        }
    }

    /// The `Error_Type` column written to the error log for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            ScraperError::Timeout { .. } => "TIMEOUT",
            ScraperError::ConnectionError(_) => "CONNECTION_ERROR",
            ScraperError::HttpStatus { status: 404, .. } => "HTTP_404",
            ScraperError::HttpStatus { status: 403, .. } => "HTTP_403",
            ScraperError::HttpStatus { .. } => "HTTP_ERROR",
            ScraperError::EmptyResponse(_) => "EMPTY_RESPONSE",
            ScraperError::NotFound(_) => "NOT_FOUND",
            ScraperError::ExtractionError(_) => "NO_DATA",
            ScraperError::RequestError(_) => "REQUEST_ERROR",
            _ => "UNKNOWN_ERROR",
        }
    }

    /// The `Details` column written to the error log: the URL for transport and status
    /// errors, the body length for short pages, the underlying cause otherwise.
    pub fn details(&self) -> String {
        match self {
            ScraperError::Timeout { url, .. } | ScraperError::HttpStatus { url, .. } => {
                format!("URL: {}", url)
            }
            ScraperError::ConnectionError(cause) => cause.clone(),
            ScraperError::EmptyResponse(len) => format!("Content length: {}", len),
            ScraperError::ExtractionError(_) => {
                "Page loaded but no bushing data extracted".to_string()
            }
            ScraperError::RequestError(err) => match err.url() {
                Some(url) => format!("URL: {}", url),
                None => format!("{:?}", err),
            },
            _ => String::new(),
        }
    }

    /// Whether this error belongs to a single item and should be logged rather than abort a run.
    pub fn is_item_error(&self) -> bool {
        matches!(
            self,
            ScraperError::Timeout { .. }
                | ScraperError::ConnectionError(_)
                | ScraperError::HttpStatus { .. }
                | ScraperError::EmptyResponse(_)
                | ScraperError::NotFound(_)
                | ScraperError::ExtractionError(_)
                | ScraperError::RequestError(_)
        )
    }
}

/// A type alias for `Result` with the `ScraperError` error type.
pub type Result<T> = std::result::Result<T, ScraperError>;

// Constants

/// The default timeout duration for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// The default delay between two requests of a batch, in seconds.
pub const DEFAULT_DELAY_SECS: f64 = 1.0;
/// Pages shorter than this are treated as empty responses.
pub const MIN_RESPONSE_LEN: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let not_found = ScraperError::HttpStatus {
            status: 404,
            url: "http://x".into(),
        };
        let forbidden = ScraperError::HttpStatus {
            status: 403,
            url: "http://x".into(),
        };
        let server = ScraperError::HttpStatus {
            status: 500,
            url: "http://x".into(),
        };

        assert_eq!(not_found.kind(), "HTTP_404");
        assert_eq!(forbidden.kind(), "HTTP_403");
        assert_eq!(server.kind(), "HTTP_ERROR");
        assert_eq!(ScraperError::EmptyResponse(3).kind(), "EMPTY_RESPONSE");
        assert!(server.is_item_error());
        assert_eq!(not_found.details(), "URL: http://x");
        assert_eq!(ScraperError::EmptyResponse(3).details(), "Content length: 3");
        assert!(!ScraperError::MissingMasterList(PathBuf::from("x.csv")).is_item_error());
    }
}
