//! The per-request repository descriptor.

use crate::version::{Version, VersionList};
use std::sync::Arc;

/// Tree shown when no version matched.
pub const DEFAULT_TREE: &str = "master";

/// Public addresses the gateway serves and resolves against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hosts {
    /// Scheme clients use to reach the gateway (`http` or `https`).
    pub gateway_scheme: String,
    /// Gateway host, with port if any. Import paths start with it.
    pub gateway_host: String,
    /// Upstream host URL with scheme and without a trailing slash.
    pub upstream_url: String,
}

/// A repository requested through an import path.
///
/// Built by the import path router, then completed once by
/// [`Repo::with_versions`] after the upstream refs have been inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    pub owner: String,
    pub name: String,
    /// Remainder of the request path, with its leading `/`, or empty.
    pub sub_path: String,
    /// The requested version, major-only in practice.
    pub major_version: Version,
    /// The best version in `all_versions` matching `major_version`, or
    /// [`Version::INVALID`] when nothing matched.
    pub full_version: Version,
    /// Every version found upstream, from branch and tag names.
    pub all_versions: VersionList,
    hosts: Arc<Hosts>,
}

impl Repo {
    /// Creates an unresolved descriptor.
    pub fn new(
        hosts: Arc<Hosts>,
        owner: impl Into<String>,
        name: impl Into<String>,
        sub_path: impl Into<String>,
        major_version: Version,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            sub_path: sub_path.into(),
            major_version,
            full_version: Version::INVALID,
            all_versions: VersionList::new(),
            hosts,
        }
    }

    /// Records the versions available upstream and picks the greatest one
    /// sharing the requested major and unstable flag.
    pub fn with_versions(self, all_versions: VersionList) -> Self {
        let wanted = self.major_version;
        let full_version = all_versions
            .iter()
            .filter(|v| v.major() == wanted.major() && v.is_unstable() == wanted.is_unstable())
            .fold(Version::INVALID, |best, v| if best.less(v) { *v } else { best });

        Self {
            full_version,
            all_versions,
            ..self
        }
    }

    pub fn hosts(&self) -> &Hosts {
        &self.hosts
    }

    /// Repository root on the upstream host, with scheme.
    pub fn upstream_root(&self) -> String {
        format!("{}/{}/{}", self.hosts.upstream_url, self.owner, self.name)
    }

    /// Upstream tree name for the resolved version.
    pub fn upstream_tree(&self) -> String {
        if self.full_version.is_valid() {
            self.full_version.to_string()
        } else {
            DEFAULT_TREE.to_string()
        }
    }

    pub fn gateway_scheme(&self) -> &str {
        &self.hosts.gateway_scheme
    }

    /// Package root on the gateway for the requested version, without scheme.
    pub fn gateway_root(&self) -> String {
        self.gateway_version_root(self.major_version)
    }

    /// Full package path on the gateway, without scheme.
    pub fn gateway_path(&self) -> String {
        format!("{}{}", self.gateway_root(), self.sub_path)
    }

    /// Package root on the gateway for `version`, reduced to its major.
    pub fn gateway_version_root(&self, version: Version) -> String {
        format!(
            "{}/{}/{}.{}",
            self.hosts.gateway_host,
            self.owner,
            self.name,
            version.major_only()
        )
    }
}
