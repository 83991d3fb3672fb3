//! Version selection and `HEAD`/`master` rewriting over a ref advertisement.

use crate::pktline::{scan, PktLine, RefLine};
use crate::{GitError, Result};
use bytes::Bytes;
use gopkg_types::{Version, VersionList};
use std::cmp::Ordering;
use std::ops::Range;
use tracing::debug;

/// Name of the symbolic head ref.
pub const HEAD_REF: &str = "HEAD";

/// Name of the default branch ref that gets replaced.
pub const MASTER_REF: &str = "refs/heads/master";

const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";

const SYMREF_CAPABILITY: &[u8] = b"symref=";
const OLDREF_CAPABILITY: &[u8] = b"oldref=";

/// A version-shaped ref that satisfies the requested constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub object_id: String,
    pub name: String,
    pub version: Version,
}

impl Candidate {
    /// Returns true if this candidate should replace `current` as the best
    /// match. Equal versions supersede, so the last one seen wins.
    pub fn supersedes(&self, current: Option<&Candidate>) -> bool {
        current.map_or(true, |current| {
            current.version.precedence(&self.version) != Ordering::Greater
        })
    }

    /// Whether the ref is a branch rather than a tag.
    pub fn is_branch(&self) -> bool {
        self.name.starts_with(BRANCH_PREFIX)
    }
}

/// Position and capability list of the advertised `HEAD` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadLine {
    pub span: Range<usize>,
    pub capabilities: Vec<u8>,
}

/// Everything a single scan of the advertisement learns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Survey {
    pub head: Option<HeadLine>,
    /// Span of the original `refs/heads/master` line.
    pub master: Option<Range<usize>>,
    /// Every version-shaped ref name found, matching or not.
    pub versions: VersionList,
    pub best: Option<Candidate>,
}

impl Survey {
    /// Scans `data` once, recording `HEAD`, `master`, the discovered versions
    /// and the best candidate for `constraint`.
    pub fn collect(data: &[u8], constraint: Version) -> Result<Self> {
        scan(data).try_fold(Self::default(), |mut survey, chunk| {
            let chunk = chunk?;
            if let Some(reference) = chunk.reference {
                survey.observe(chunk.span, reference, constraint);
            }
            Ok(survey)
        })
    }

    fn observe(&mut self, span: Range<usize>, reference: RefLine<'_>, constraint: Version) {
        if !reference.peeled {
            match reference.name {
                HEAD_REF => {
                    self.head = Some(HeadLine {
                        span,
                        capabilities: reference.capabilities.unwrap_or_default().to_vec(),
                    });
                    return;
                }
                MASTER_REF => {
                    self.master = Some(span);
                    return;
                }
                _ => {}
            }
        }

        let Some(version) = ref_version(reference.name) else {
            return;
        };
        self.versions.push(version);

        if !constraint.contains(&version) {
            return;
        }
        let candidate = Candidate {
            object_id: reference.object_id.to_string(),
            name: reference.name.to_string(),
            version,
        };
        if candidate.supersedes(self.best.as_ref()) {
            self.best = Some(candidate);
        }
    }
}

/// A rewritten advertisement together with the versions it offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub advertisement: Bytes,
    pub versions: VersionList,
}

/// Rewrites `HEAD` and `master` in the advertisement to point at the best
/// ref satisfying `constraint`.
///
/// A repository without any version-shaped refs is passed through untouched
/// when `v0` is requested.
pub fn rewrite_refs(data: &Bytes, constraint: Version) -> Result<Rewritten> {
    let survey = Survey::collect(data, constraint)?;

    if survey.versions.is_empty() && constraint == Version::new(0) {
        debug!("no version refs found, serving advertisement unchanged");
        return Ok(Rewritten {
            advertisement: data.clone(),
            versions: survey.versions,
        });
    }

    let (Some(head), Some(best)) = (survey.head, survey.best) else {
        return Err(GitError::NoMatchingVersion(constraint));
    };

    debug!(
        requested = %constraint,
        selected = %best.version,
        reference = %best.name,
        "rewriting HEAD and master"
    );

    let mut out = Vec::with_capacity(data.len() + 128);
    copy_except(&mut out, data, 0..head.span.start, survey.master.as_ref());
    PktLine::from_bytes(head_line(&best, &head.capabilities)).encode_into(&mut out);
    PktLine::from_string(&format!("{} {}\n", best.object_id, MASTER_REF)).encode_into(&mut out);
    copy_except(&mut out, data, head.span.end..data.len(), survey.master.as_ref());

    Ok(Rewritten {
        advertisement: Bytes::from(out),
        versions: survey.versions,
    })
}

/// Parses the version of a `refs/heads/v*` or `refs/tags/v*` name.
fn ref_version(name: &str) -> Option<Version> {
    let short = name
        .strip_prefix(BRANCH_PREFIX)
        .or_else(|| name.strip_prefix(TAG_PREFIX))?;
    if !short.starts_with('v') {
        return None;
    }
    Version::parse(short)
}

fn head_line(best: &Candidate, capabilities: &[u8]) -> Vec<u8> {
    let capabilities = rename_symref(capabilities);
    let mut line = format!("{} {}", best.object_id, HEAD_REF).into_bytes();
    if best.is_branch() {
        line.extend_from_slice(b"\0symref=HEAD:");
        line.extend_from_slice(best.name.as_bytes());
        if !capabilities.is_empty() {
            line.push(b' ');
        }
    } else if !capabilities.is_empty() {
        line.push(0);
    }
    line.extend_from_slice(&capabilities);
    line.push(b'\n');
    line
}

/// Renames every `symref=` capability to `oldref=`.
fn rename_symref(capabilities: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(capabilities.len());
    let mut rest = capabilities;
    while !rest.is_empty() {
        if rest.starts_with(SYMREF_CAPABILITY) {
            out.extend_from_slice(OLDREF_CAPABILITY);
            rest = &rest[SYMREF_CAPABILITY.len()..];
        } else {
            out.push(rest[0]);
            rest = &rest[1..];
        }
    }
    out
}

/// Copies `data[range]` into `out`, leaving out `skip` if it lies inside.
fn copy_except(out: &mut Vec<u8>, data: &[u8], range: Range<usize>, skip: Option<&Range<usize>>) {
    match skip {
        Some(skip) if range.start <= skip.start && skip.end <= range.end => {
            out.extend_from_slice(&data[range.start..skip.start]);
            out.extend_from_slice(&data[skip.end..range.end]);
        }
        _ => out.extend_from_slice(&data[range]),
    }
}
