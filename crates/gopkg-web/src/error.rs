//! Error types for page rendering.

use thiserror::Error;

/// Page rendering errors.
#[derive(Debug, Error)]
pub enum WebError {
    /// Template rendering error.
    #[error("template error: {0}")]
    Template(String),
}

impl From<askama::Error> for WebError {
    fn from(err: askama::Error) -> Self {
        WebError::Template(err.to_string())
    }
}
