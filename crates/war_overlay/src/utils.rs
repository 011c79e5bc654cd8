//! Path and naming helpers shared by the packaging tasks.

use crate::error::{Error, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::path::Path;
use war_project::Dependency;
use xxhash_rust::xxh3::xxh3_64;

/// Compute a fingerprint of a dependency set.
///
/// The fingerprint covers the coordinates, scope and optional flag of every
/// dependency. It is independent of the declaration order and of where the
/// artifact files live on disk.
pub fn dependency_fingerprint(dependencies: &[Dependency]) -> u64 {
    let mut keys = dependencies
        .iter()
        .map(|d| {
            format!(
                "{}:{}:{}:{}:{}:{}:{}",
                d.group_id,
                d.artifact_id,
                d.kind,
                d.classifier().unwrap_or_default(),
                d.version,
                d.scope,
                d.optional
            )
        })
        .collect::<Vec<_>>();
    keys.sort();

    xxh3_64(keys.join("\n").as_bytes())
}

/// Relative webapp path with forward slashes.
pub fn to_webapp_path(rel_path: &Utf8Path) -> String {
    rel_path
        .components()
        .filter(|c| !matches!(c, Utf8Component::CurDir | Utf8Component::RootDir))
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Convert a std path produced by a directory walk.
pub(crate) fn utf8_path(path: &Path) -> Result<&Utf8Path> {
    Utf8Path::from_path(path).ok_or_else(|| Error::NonUtf8Path(path.display().to_string()))
}

/// Resolve a webapp relative path (`WEB-INF/web.xml`) under `root`.
pub(crate) fn webapp_file(root: &Utf8Path, webapp_path: &str) -> Utf8PathBuf {
    webapp_path
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Expand an output file name mapping such as
/// `@{artifactId}@-@{version}@.@{extension}@` for `dependency`.
///
/// Unknown tokens are left untouched.
pub fn map_file_name(mapping: &str, dependency: &Dependency) -> String {
    let classifier = dependency.classifier().unwrap_or_default();
    let dash_classifier = match dependency.classifier() {
        Some(c) => format!("-{}", c),
        None => String::new(),
    };

    [
        ("@{groupId}@", dependency.group_id.as_str()),
        ("@{artifactId}@", dependency.artifact_id.as_str()),
        ("@{version}@", dependency.version.as_str()),
        ("@{baseVersion}@", dependency.version.as_str()),
        ("@{type}@", dependency.kind.as_str()),
        ("@{extension}@", dependency.extension()),
        ("@{classifier}@", classifier),
        ("@{dashClassifier}@", dash_classifier.as_str()),
        ("@{dashClassifier?}@", dash_classifier.as_str()),
    ]
    .iter()
    .fold(mapping.to_string(), |name, (token, value)| {
        name.replace(token, value)
    })
}
