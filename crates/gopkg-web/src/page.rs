//! Rendering of the gateway pages for a resolved repository.

use crate::error::WebError;
use crate::templates::{GoGetTemplate, PackageTemplate, VersionLink};
use askama::Template;
use gopkg_types::{Repo, Version, DEFAULT_TREE};

/// Renders the page answering `go get`.
pub fn go_get_page(repo: &Repo) -> Result<String, WebError> {
    let scheme = repo.gateway_scheme();
    let upstream = repo.upstream_root();
    let tree = repo.upstream_tree();

    let template = GoGetTemplate {
        root: repo.gateway_root(),
        scheme: scheme.to_string(),
        path: repo.gateway_path(),
        source_tree: format!("{upstream}/tree/{tree}"),
        source_blob: format!("{upstream}/blob/{tree}"),
    };
    Ok(template.render()?)
}

/// Renders the human-readable package page.
pub fn package_page(repo: &Repo) -> Result<String, WebError> {
    let upstream = repo.upstream_root();
    let tree = repo.upstream_tree();

    let template = PackageTemplate {
        title: format!("{}.{}{}", repo.name, repo.major_version, repo.sub_path),
        path: repo.gateway_path(),
        unstable: repo.major_version.is_unstable(),
        insecure: repo.gateway_scheme() == "http",
        source_url: format!("{upstream}/tree/{tree}{}", repo.sub_path),
        docs_url: format!("{upstream}/blob/{tree}/README.md"),
        versions: version_links(repo),
    };
    Ok(template.render()?)
}

/// Latest stable version of each major, newest first, with the resolved
/// unstable version in front when one was requested.
pub fn version_links(repo: &Repo) -> Vec<VersionLink> {
    let mut latest: Vec<Version> = repo.all_versions.latest_per_major().into_inner();
    if repo.full_version.is_unstable() {
        latest.insert(0, repo.full_version);
    }

    if latest.is_empty() {
        return vec![VersionLink {
            href: format!("//{}", repo.gateway_path()),
            label: Version::new(0).to_string(),
            full: DEFAULT_TREE.to_string(),
            current: true,
        }];
    }

    let wanted = repo.major_version;
    latest
        .into_iter()
        .map(|version| VersionLink {
            href: format!("//{}{}", repo.gateway_version_root(version), repo.sub_path),
            label: version.major_only().to_string(),
            full: version.to_string(),
            current: version.major() == wanted.major()
                && version.is_unstable() == wanted.is_unstable(),
        })
        .collect()
}
