//! Git ref advertisement handling for the gopkg gateway.
//!
//! This crate scans the pkt-line framed advertisement served by
//! `info/refs?service=git-upload-pack`, picks the branch or tag that best
//! satisfies a requested major version, and rewrites `HEAD` and `master`
//! so standard git clients check out that version by default.
//! See: https://git-scm.com/docs/http-protocol

mod error;
mod pktline;
mod refs;

pub use error::GitError;
pub use pktline::{scan, Chunk, PktLine, RefLine, Scanner};
pub use refs::{rewrite_refs, Candidate, HeadLine, Rewritten, Survey, HEAD_REF, MASTER_REF};

/// Result type for ref advertisement operations.
pub type Result<T> = std::result::Result<T, GitError>;
