//! Askama template definitions.

use askama::Template;

/// One row of the versions panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionLink {
    /// Scheme-relative link to the package at that major.
    pub href: String,
    /// Major-only label, e.g. `v2` or `v3-unstable`.
    pub label: String,
    /// Full version the major resolves to.
    pub full: String,
    /// Whether this row is the major being viewed.
    pub current: bool,
}

/// Minimal page answering `go get` with import and source meta tags.
#[derive(Template)]
#[template(path = "go_get.html")]
pub struct GoGetTemplate {
    pub root: String,
    pub scheme: String,
    pub path: String,
    pub source_tree: String,
    pub source_blob: String,
}

/// Human-readable package page.
#[derive(Template)]
#[template(path = "package.html")]
pub struct PackageTemplate {
    pub title: String,
    pub path: String,
    pub unstable: bool,
    pub insecure: bool,
    pub source_url: String,
    pub docs_url: String,
    pub versions: Vec<VersionLink>,
}
