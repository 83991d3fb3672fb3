//! Ref advertisement error types.

use gopkg_types::Version;
use thiserror::Error;

/// Errors that can occur while scanning or rewriting a ref advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitError {
    /// The advertisement violates pkt-line framing.
    #[error("malformed ref advertisement: {0}")]
    MalformedAdvertisement(String),

    /// No `HEAD` line, or no ref satisfies the requested version.
    #[error("no branch or tag matches version {0}")]
    NoMatchingVersion(Version),
}
