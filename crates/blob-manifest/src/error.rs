//! Error types for the manifest source

use std::fmt;

/// Errors from manifest and blob fetching
#[derive(Debug)]
pub enum ManifestError {
    /// HTTP request failed outright
    Http(reqwest::Error),
    /// Unexpected response status
    Status(reqwest::StatusCode),
    /// The resource does not exist at the storage endpoint
    NotFound,
    /// Manifest body is not the expected JSON shape
    Parse(serde_json::Error),
    /// The configured manifest URL cannot address blobs
    BadUrl(String),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "storage HTTP error: {}", e),
            Self::Status(status) => write!(f, "storage returned status {}", status),
            Self::NotFound => write!(f, "resource not found at storage endpoint"),
            Self::Parse(e) => write!(f, "manifest parse error: {}", e),
            Self::BadUrl(detail) => write!(f, "unable to parse storage url: {}", detail),
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ManifestError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<serde_json::Error> for ManifestError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, ManifestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        assert_eq!(
            format!("{}", ManifestError::NotFound),
            "resource not found at storage endpoint"
        );
    }

    #[test]
    fn test_bad_url_display() {
        let err = ManifestError::BadUrl("nope".to_string());
        assert!(format!("{}", err).contains("nope"));
    }

    #[test]
    fn test_status_display() {
        let err = ManifestError::Status(reqwest::StatusCode::BAD_GATEWAY);
        assert!(format!("{}", err).contains("502"));
    }
}
