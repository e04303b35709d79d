//! Error types for the refreshable cache

use std::fmt;

/// Errors raised when opening an entry's content at serve time
#[derive(Debug)]
pub enum StreamError {
    /// The entry's content can no longer be read from its source
    SourceUnavailable(String),
    /// The key is poisoned: two distinct source paths normalized to it
    AmbiguousKey,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable(detail) => write!(f, "content source unavailable: {}", detail),
            Self::AmbiguousKey => write!(f, "unable to resolve duplicate path"),
        }
    }
}

impl std::error::Error for StreamError {}

/// Failure of one whole snapshot production cycle
///
/// Wraps whatever the backend reports. The cache treats any such failure
/// the same way: keep the previous live map, flag the diagnostic.
#[derive(Debug)]
pub struct SourceError(Box<dyn std::error::Error + Send + Sync>);

impl SourceError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snapshot source error: {}", self.0)
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_display() {
        let err = StreamError::SourceUnavailable("gone.txt: No such file".to_string());
        assert!(format!("{}", err).contains("gone.txt"));

        let err = StreamError::AmbiguousKey;
        assert_eq!(format!("{}", err), "unable to resolve duplicate path");
    }

    #[test]
    fn test_source_error_wraps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = SourceError::new(io);
        assert!(format!("{}", err).contains("boom"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
