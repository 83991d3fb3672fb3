//! Import path routing.
//!
//! Maps `/<owner>/<name>.<version>[.git][/<sub path>]` onto a [`Repo`].

use gopkg_types::{Hosts, Repo, Version};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

/// Regex for versioned import paths.
pub static IMPORT_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^/([a-zA-Z0-9][-a-zA-Z0-9_]*)",
        r"/([a-zA-Z0-9][-.a-zA-Z0-9_]*)",
        r"\.((?:v0|v[1-9][0-9]*)(?:\.0|\.[1-9][0-9]*){0,2}(?:-unstable)?)",
        r"(?:\.git)?",
        r"((?:/[a-zA-Z0-9][-.a-zA-Z0-9_]*)*)$",
    ))
    .expect("Invalid regex")
});

/// Reasons a request path is not a servable import path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("unsupported import path")]
    UnsupportedPath,

    /// Minor or patch components were given.
    #[error("import path version {given} is not major-only, use {suggested}")]
    VersionTooPrecise { given: String, suggested: String },

    /// The path matched but its version did not parse.
    #[error("version {0:?} matched the import path but did not parse")]
    InvalidVersion(String),
}

/// Parses request paths into unresolved repository descriptors.
#[derive(Debug, Clone)]
pub struct ImportRouter {
    hosts: Arc<Hosts>,
}

impl ImportRouter {
    pub fn new(hosts: Arc<Hosts>) -> Self {
        Self { hosts }
    }

    /// Routes a request path.
    pub fn route(&self, path: &str) -> Result<Repo, RouteError> {
        let captures = IMPORT_PATH_REGEX
            .captures(path)
            .ok_or(RouteError::UnsupportedPath)?;
        let group = |i| captures.get(i).map_or("", |m| m.as_str());
        let (owner, name, version, sub_path) = (group(1), group(2), group(3), group(4));

        if let Some((major, _)) = version.split_once('.') {
            return Err(RouteError::VersionTooPrecise {
                given: version.to_string(),
                suggested: major.to_string(),
            });
        }

        let major_version =
            Version::parse(version).ok_or_else(|| RouteError::InvalidVersion(version.to_string()))?;

        Ok(Repo::new(
            Arc::clone(&self.hosts),
            owner,
            name,
            sub_path,
            major_version,
        ))
    }
}
