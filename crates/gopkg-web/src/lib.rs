//! gopkg pages
//!
//! HTML served for import paths that are not git protocol requests:
//! - the `go get` page carrying `go-import` and `go-source` meta tags
//! - the package page with install instructions and the versions panel

pub mod error;
pub mod page;
pub mod templates;

pub use error::WebError;
pub use page::{go_get_page, package_page, version_links};
pub use templates::{GoGetTemplate, PackageTemplate, VersionLink};
