//! Overlay ordering.
//!
//! The [`OverlayManager`] turns the configured overlay entries and the project
//! dependencies into the ordered list the packaging tasks run in:
//!
//! 1. Explicit overlays, in configured order. The current project keeps the
//!    position of its entry; without one it is inserted first.
//! 2. Implicit overlays, one per dependency whose type is an overlay type and
//!    that no explicit entry matches, in dependency order.
//!
//! Earlier overlays have priority: the first one to supply a path owns it.

use crate::error::{Error, Result};
use crate::overlay::{Overlay, CURRENT_BUILD_ID};
use std::collections::HashSet;
use war_project::{Dependency, OverlayConfig, WarProject};

/// Resolved, ordered overlays of a build.
#[derive(Debug, Clone)]
pub struct OverlayManager {
    overlays: Vec<Overlay>,
}

impl OverlayManager {
    /// Resolve the overlays of `project`.
    pub fn from_project(project: &WarProject) -> Result<Self> {
        Self::resolve(
            &project.war.overlays,
            &project.dependencies,
            &project.war.overlay_types,
        )
    }

    /// Resolve configured overlays against the project dependencies.
    ///
    /// Fails on duplicate ids, malformed entries, explicit overlays without a
    /// matching dependency and overlays without an artifact file. Nothing is
    /// read from or written to disk.
    pub fn resolve(
        configured: &[OverlayConfig],
        dependencies: &[Dependency],
        overlay_types: &[String],
    ) -> Result<Self> {
        let mut overlays = Vec::with_capacity(configured.len() + 1);
        let mut ids = HashSet::new();

        for config in configured {
            let mut overlay = Overlay::from_config(config)?;
            if !ids.insert(overlay.id.clone()) {
                return Err(Error::DuplicateOverlayId(overlay.id));
            }

            if !overlay.is_current_project() {
                let dependency = dependencies
                    .iter()
                    .find(|d| overlay.matches(d))
                    .ok_or_else(|| Error::OverlayNotADependency(overlay.id.clone()))?;
                overlay.artifact = Some(dependency.clone());
            }
            overlays.push(overlay);
        }

        if !ids.contains(CURRENT_BUILD_ID) {
            ids.insert(CURRENT_BUILD_ID.to_string());
            overlays.insert(0, Overlay::current_project());
        }

        let implicit = dependencies
            .iter()
            .filter(|d| d.is_bundled() && overlay_types.iter().any(|t| *t == d.kind))
            .filter(|d| !overlays.iter().any(|o| o.matches(d)))
            .collect::<Vec<_>>();
        for dependency in implicit {
            let mut overlay = Overlay::implicit(dependency);
            if ids.contains(&overlay.id) {
                // Same coordinates under another type, e.g. a war and a jar.
                overlay.id = format!("{}:{}", overlay.id, dependency.kind);
            }
            if !ids.insert(overlay.id.clone()) {
                return Err(Error::DuplicateOverlayId(overlay.id));
            }
            tracing::debug!("Implicit overlay {}", overlay);
            overlays.push(overlay);
        }

        for overlay in overlays.iter().filter(|o| !o.skip) {
            if let Some(artifact) = &overlay.artifact {
                if artifact.file.is_none() {
                    return Err(Error::MissingArtifactFile {
                        artifact: artifact.to_string(),
                        path: artifact.default_file_name().into(),
                    });
                }
            }
        }

        Ok(Self { overlays })
    }

    /// Check that every overlay artifact that will be unpacked exists on disk.
    pub fn check_artifacts(&self) -> Result<()> {
        for overlay in self.overlays.iter().filter(|o| !o.skip) {
            let Some(artifact) = &overlay.artifact else {
                continue;
            };
            if let Some(file) = &artifact.file {
                if !file.as_std_path().is_file() {
                    return Err(Error::MissingArtifactFile {
                        artifact: artifact.to_string(),
                        path: file.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    /// Ids of [`overlays`](Self::overlays), in the same order.
    pub fn overlay_ids(&self) -> Vec<&str> {
        self.overlays.iter().map(|o| o.id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.id == id)
    }

    /// Index of the current project in the resolved order.
    pub fn current_project_position(&self) -> usize {
        self.overlays
            .iter()
            .position(Overlay::is_current_project)
            .unwrap_or_default()
    }

    /// Whether `dependency` is applied as one of the overlays.
    pub fn is_overlay_artifact(&self, dependency: &Dependency) -> bool {
        self.overlays.iter().any(|o| o.matches(dependency))
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}
