//! Overlay definitions.
//!
//! An [`Overlay`] is one source of webapp content. The current project is an
//! overlay too (identified by [`CURRENT_BUILD_ID`]), so its position relative to
//! the dependency overlays can be configured like any other entry.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use war_project::{Dependency, OverlayConfig};

/// Identifier reserved for the overlay representing the current project.
pub const CURRENT_BUILD_ID: &str = "currentBuild";

/// Include pattern used when an overlay doesn't specify any.
pub const DEFAULT_INCLUDES: &str = "**";

/// One resolved source of webapp content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    /// Unique identifier, used as the owner id in the webapp structure.
    pub id: String,
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub classifier: Option<String>,
    /// Dependency type this overlay matches (`war` by default).
    pub kind: String,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    /// Apply resource filtering to the overlay's files.
    pub filtered: bool,
    /// Keep the overlay in the ordering but don't copy anything from it.
    pub skip: bool,
    /// Sub directory of the webapp the overlay is unpacked to.
    pub target_path: Option<String>,
    /// Dependency backing this overlay; `None` for the current project.
    pub artifact: Option<Dependency>,
    /// Whether the overlay was synthesized from a dependency.
    pub implicit: bool,
}

impl Overlay {
    /// The overlay standing for the current project.
    pub fn current_project() -> Self {
        Self {
            id: CURRENT_BUILD_ID.to_string(),
            group_id: None,
            artifact_id: None,
            classifier: None,
            kind: "war".to_string(),
            includes: vec![DEFAULT_INCLUDES.to_string()],
            excludes: Vec::new(),
            filtered: false,
            skip: false,
            target_path: None,
            artifact: None,
            implicit: false,
        }
    }

    /// Build an overlay from an explicit configuration entry.
    ///
    /// The artifact is not attached yet; see [`OverlayManager`](crate::OverlayManager).
    pub fn from_config(config: &OverlayConfig) -> Result<Self> {
        let group_id = non_blank(config.group_id.as_deref());
        let artifact_id = non_blank(config.artifact_id.as_deref());
        let classifier = non_blank(config.classifier.as_deref());
        let explicit_id = non_blank(config.id.as_deref());

        match (&group_id, &artifact_id) {
            (None, None) => {
                if let Some(id) = explicit_id.filter(|id| id != CURRENT_BUILD_ID) {
                    return Err(Error::InvalidOverlay {
                        id,
                        reason: format!(
                            "an overlay without coordinates is the current build and must use id '{}'",
                            CURRENT_BUILD_ID
                        ),
                    });
                }
                let mut overlay = Self::current_project();
                overlay.includes = split_patterns(&config.includes);
                overlay.excludes = split_patterns(&config.excludes);
                overlay.filtered = config.filtered;
                overlay.skip = config.skip;
                Ok(overlay)
            }
            (Some(group), Some(artifact)) => {
                let id = explicit_id
                    .unwrap_or_else(|| default_id(group, artifact, classifier.as_deref()));
                if id == CURRENT_BUILD_ID {
                    return Err(Error::ReservedOverlayId(id));
                }
                if config.target_path.as_deref().is_some_and(escapes_webapp) {
                    return Err(Error::InvalidOverlay {
                        id,
                        reason: "target_path must stay inside the webapp directory".to_string(),
                    });
                }
                Ok(Self {
                    id,
                    group_id: Some(group.clone()),
                    artifact_id: Some(artifact.clone()),
                    classifier,
                    kind: config.kind.clone(),
                    includes: split_patterns(&config.includes),
                    excludes: split_patterns(&config.excludes),
                    filtered: config.filtered,
                    skip: config.skip,
                    target_path: non_blank(config.target_path.as_deref()),
                    artifact: None,
                    implicit: false,
                })
            }
            _ => Err(Error::InvalidOverlay {
                id: explicit_id.unwrap_or_else(|| {
                    format!(
                        "{}:{}",
                        group_id.as_deref().unwrap_or("?"),
                        artifact_id.as_deref().unwrap_or("?")
                    )
                }),
                reason: "both group_id and artifact_id are required".to_string(),
            }),
        }
    }

    /// Synthesize an overlay for a dependency that has no explicit entry.
    pub fn implicit(dependency: &Dependency) -> Self {
        Self {
            id: default_id(
                &dependency.group_id,
                &dependency.artifact_id,
                dependency.classifier(),
            ),
            group_id: Some(dependency.group_id.clone()),
            artifact_id: Some(dependency.artifact_id.clone()),
            classifier: dependency.classifier().map(str::to_string),
            kind: dependency.kind.clone(),
            includes: vec![DEFAULT_INCLUDES.to_string()],
            excludes: Vec::new(),
            filtered: false,
            skip: false,
            target_path: None,
            artifact: Some(dependency.clone()),
            implicit: true,
        }
    }

    pub fn is_current_project(&self) -> bool {
        self.group_id.is_none() && self.artifact_id.is_none()
    }

    /// Whether `dependency` is the artifact this overlay refers to.
    pub fn matches(&self, dependency: &Dependency) -> bool {
        self.group_id.as_deref() == Some(dependency.group_id.as_str())
            && self.artifact_id.as_deref() == Some(dependency.artifact_id.as_str())
            && self.kind == dependency.kind
            && self.classifier.as_deref() == dependency.classifier()
    }

    /// Prefix prepended to every path copied from this overlay.
    ///
    /// Empty for the webapp root, otherwise a relative path ending in `/`.
    pub fn target_prefix(&self) -> String {
        normalize_target_path(self.target_path.as_deref())
    }

    /// Directory inside `work_dir` the overlay archive is unpacked to.
    ///
    /// Keyed on the artifact identity, `<groupId>/<artifactId>[-classifier]-<type>`,
    /// so archives sharing a file name never share a directory.
    pub fn unpack_directory(&self, work_dir: &Utf8Path) -> Option<Utf8PathBuf> {
        let artifact = self.artifact.as_ref()?;
        let name = match artifact.classifier() {
            Some(classifier) => format!(
                "{}-{}-{}",
                artifact.artifact_id, classifier, artifact.kind
            ),
            None => format!("{}-{}", artifact.artifact_id, artifact.kind),
        };
        Some(
            work_dir
                .join(path_segment(&artifact.group_id))
                .join(path_segment(&name)),
        )
    }
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_current_project() {
            return f.write_str(CURRENT_BUILD_ID);
        }
        write!(
            f,
            "{}:{}:{}",
            self.kind,
            self.group_id.as_deref().unwrap_or_default(),
            self.artifact_id.as_deref().unwrap_or_default()
        )?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        if let Some(artifact) = &self.artifact {
            write!(f, ":{}", artifact.version)?;
        }
        Ok(())
    }
}

/// `groupId:artifactId[:classifier]`.
pub fn default_id(group_id: &str, artifact_id: &str, classifier: Option<&str>) -> String {
    match classifier {
        Some(classifier) => format!("{}:{}:{}", group_id, artifact_id, classifier),
        None => format!("{}:{}", group_id, artifact_id),
    }
}

/// Split a comma separated pattern list, dropping blank entries.
pub fn split_patterns(patterns: &str) -> Vec<String> {
    patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// `None`, `""`, `"."` and `"./"` mean the webapp root.
pub(crate) fn normalize_target_path(target_path: Option<&str>) -> String {
    let Some(path) = target_path else {
        return String::new();
    };
    let path = path.trim().replace('\\', "/");
    let path = path.trim_start_matches("./").trim_matches('/');
    if path.is_empty() || path == "." {
        return String::new();
    }
    format!("{}/", path)
}

/// Whether a relative webapp path climbs out of the webapp with `..`.
pub(crate) fn escapes_webapp(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment.trim() == "..")
}

/// Replace characters that can't appear in a single path segment.
fn path_segment(value: &str) -> String {
    let segment = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect::<String>();
    match segment.as_str() {
        "" | "." | ".." => format!("_{}", segment),
        _ => segment,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
