//! Common types used throughout `gopkg`.
//!
//! This crate provides the version model that import paths and upstream
//! ref names are matched against, and the per-request [`Repo`] descriptor.

mod repo;
mod version;

pub use repo::{Hosts, Repo, DEFAULT_TREE};
pub use version::{Version, VersionError, VersionList, UNSTABLE_SUFFIX};
