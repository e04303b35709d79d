//! Error types for the Homestead server

use std::fmt;

#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Bind(String),
    Tls(Box<std::io::Error>),
    Source(blob_manifest::ManifestError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ServerError::Bind(msg) => write!(f, "Listener error: {}", msg),
            ServerError::Tls(err) => write!(f, "TLS error: {}", err),
            ServerError::Source(err) => write!(f, "Content source error: {}", err),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Tls(err) => Some(err.as_ref()),
            ServerError::Source(err) => Some(err),
            _ => None,
        }
    }
}

impl From<blob_manifest::ManifestError> for ServerError {
    fn from(err: blob_manifest::ManifestError) -> Self {
        ServerError::Source(err)
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
