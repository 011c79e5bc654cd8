//! Webapp build orchestration.
//!
//! The [`WarBuilder`] runs a complete packaging pipeline for one
//! [`WarProject`]:
//!
//! 1. Resolve the overlays ([`OverlayManager::from_project`]), check that every
//!    overlay artifact exists, load the structure cache (when `use_cache` is
//!    set) and assemble the [`PackagingContext`]. Every configuration error is
//!    reported here, before anything is written.
//! 2. Unpack all overlay archives into the work directory, in parallel.
//!    Archives already extracted by a previous run are reused.
//! 3. Run the [`PackagingTask`] list against the context, one task at a time.
//! 4. Save the webapp structure so the next run can detect stale files.
//!
//! [`WarBuilder::package`] additionally zips the webapp directory into
//! `<output_directory>/<final_name>.war`.

use crate::archive::{create_war, unpack_if_modified, ArchiveOptions, ArchiveSummary};
use crate::context::PackagingContext;
use crate::error::{Error, Result};
use crate::overlay::split_patterns;
use crate::overlay_manager::OverlayManager;
use crate::structure::{CacheLoad, WebappStructure};
use crate::tasks::{PackagingTask, PostPackagingTask};
use camino::Utf8PathBuf;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use war_project::WarProject;

/// Progress information emitted while a webapp is built.
///
/// `current`/`total` count packaging tasks during
/// [`Packaging`](PackagingStage::Packaging) and overlay archives during
/// [`Unpacking`](PackagingStage::Unpacking).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagingProgress {
    pub stage: PackagingStage,
    /// Name of the task currently running.
    pub current_task: Option<String>,
    pub current: u32,
    pub total: u32,
}

/// Stages of the packaging pipeline, in the order they are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PackagingStage {
    /// Resolving overlays and loading the structure cache.
    Resolving,
    /// Extracting overlay archives into the work directory.
    Unpacking,
    /// Running a packaging task.
    Packaging,
    /// Writing the structure cache.
    SavingStructure,
    /// Writing the archive (only for [`WarBuilder::package`]).
    Archiving,
    Complete,
}

/// Summary of an assembled webapp directory.
#[derive(Debug)]
pub struct ExplodeResult {
    pub webapp_directory: Utf8PathBuf,
    /// Overlay ids in the order they were applied.
    pub overlays: Vec<String>,
    /// Number of paths registered in the webapp.
    pub files: usize,
    /// Number of overlay archives extracted during this run.
    pub unpacked: usize,
    pub structure: WebappStructure,
    pub build_time: Duration,
}

/// Summary of a packaged archive.
#[derive(Debug)]
pub struct PackageResult {
    pub exploded: ExplodeResult,
    pub archive: ArchiveSummary,
}

type ProgressCallback = Arc<dyn Fn(PackagingProgress) + Send + Sync>;

/// Assembles the webapp of a [`WarProject`] and packages it.
pub struct WarBuilder<'a> {
    project: &'a WarProject,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> WarBuilder<'a> {
    pub fn new(project: &'a WarProject) -> Self {
        Self {
            project,
            progress_callback: None,
        }
    }

    /// Register a progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(PackagingProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Assemble the exploded webapp directory.
    pub fn explode(&self) -> Result<ExplodeResult> {
        let result = self.assemble()?;
        self.emit(PackagingStage::Complete, None, 0, 0);
        Ok(result)
    }

    /// Assemble the webapp and zip it into `<output_directory>/<final_name>.war`.
    pub fn package(&self) -> Result<PackageResult> {
        let project = self.project;
        let exploded = self.assemble()?;

        self.emit(PackagingStage::Archiving, None, 0, 0);
        let output = project
            .output_directory()
            .join(format!("{}.war", project.final_name()));
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }
        tracing::info!("Packaging webapp into {}", output);
        let archive = create_war(&exploded.webapp_directory, &output, &archive_options(project))?;

        self.emit(PackagingStage::Complete, None, 0, 0);
        tracing::info!("Built {} ({} entries)", archive.path, archive.files);
        Ok(PackageResult { exploded, archive })
    }

    fn assemble(&self) -> Result<ExplodeResult> {
        let start_time = Instant::now();
        let project = self.project;
        self.emit(PackagingStage::Resolving, None, 0, 0);

        let manager = OverlayManager::from_project(project)?;
        manager.check_artifacts()?;
        if let Some(web_xml) = &project.war.web_xml {
            if !web_xml.as_std_path().is_file() {
                return Err(Error::WebXmlNotFound(web_xml.clone()));
            }
        }

        let cache_file = project.cache_file();
        let cache = if project.war.use_cache {
            WebappStructure::load(&cache_file, &project.dependencies)?
        } else {
            CacheLoad::Missing
        };
        let mut context = PackagingContext::new(project, &manager, cache)?;

        tracing::info!(
            "Assembling webapp [{}] in {}",
            project.artifact_id,
            context.webapp_directory()
        );
        tracing::info!("Overlays: {}", manager.overlay_ids().join(", "));

        let unpacked = self.unpack_overlays(&manager, &context)?;

        std::fs::create_dir_all(context.webapp_directory().as_std_path())?;

        let tasks = PackagingTask::plan(&manager, context.use_cache());
        let total = tasks.len() as u32;
        for (idx, task) in tasks.iter().enumerate() {
            self.emit(
                PackagingStage::Packaging,
                Some(task.to_string()),
                idx as u32 + 1,
                total,
            );
            task.perform(&mut context)?;
        }

        if context.use_cache() {
            self.emit(PackagingStage::SavingStructure, None, 0, 0);
            PostPackagingTask::SaveStructure(cache_file).perform(&mut context)?;
        }

        let webapp_directory = context.webapp_directory().to_path_buf();
        let overlays = context.overlay_ids().to_vec();
        let structure = context.into_structure();
        let files = structure.full_structure().len();
        let build_time = start_time.elapsed();
        tracing::info!(
            "Webapp assembled in {} ({} files, {:.2?})",
            webapp_directory,
            files,
            build_time
        );

        Ok(ExplodeResult {
            webapp_directory,
            overlays,
            files,
            unpacked,
            structure,
            build_time,
        })
    }

    /// Extract every overlay archive that is not up to date, in parallel.
    ///
    /// Each unpack directory is extracted by a single job, even when several
    /// overlays select from the same artifact.
    fn unpack_overlays(&self, manager: &OverlayManager, context: &PackagingContext<'_>) -> Result<usize> {
        let mut seen = HashSet::new();
        let jobs = manager
            .overlays()
            .iter()
            .filter(|overlay| !overlay.skip)
            .filter_map(|overlay| {
                let archive = overlay.artifact.as_ref()?.file.clone()?;
                let dest = overlay.unpack_directory(context.work_directory())?;
                Some((overlay.id.clone(), archive, dest))
            })
            .filter(|(_, _, dest)| seen.insert(dest.clone()))
            .collect::<Vec<_>>();
        if jobs.is_empty() {
            return Ok(0);
        }

        self.emit(PackagingStage::Unpacking, None, 0, jobs.len() as u32);
        std::fs::create_dir_all(context.work_directory().as_std_path())?;

        let preserve_permissions = context.preserve_permissions();
        let extracted = jobs
            .par_iter()
            .map(|(id, archive, dest)| {
                unpack_if_modified(archive, dest, preserve_permissions).map_err(|e| Error::Unpack {
                    overlay: id.clone(),
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<bool>>>()?;

        let count = extracted.into_iter().filter(|fresh| *fresh).count();
        self.emit(
            PackagingStage::Unpacking,
            None,
            jobs.len() as u32,
            jobs.len() as u32,
        );
        tracing::info!("Unpacked {} of {} overlays", count, jobs.len());
        Ok(count)
    }

    fn emit(&self, stage: PackagingStage, current_task: Option<String>, current: u32, total: u32) {
        if let Some(callback) = &self.progress_callback {
            callback(PackagingProgress {
                stage,
                current_task,
                current,
                total,
            });
        }
    }
}

/// Archive options from the project configuration.
pub fn archive_options(project: &WarProject) -> ArchiveOptions {
    let config = &project.war;
    ArchiveOptions {
        includes: config
            .packaging_includes
            .as_deref()
            .map(split_patterns)
            .unwrap_or_default(),
        excludes: config
            .packaging_excludes
            .as_deref()
            .map(split_patterns)
            .unwrap_or_default(),
        include_empty_directories: config.include_empty_directories,
        preserve_permissions: config.preserve_permissions,
        fail_on_missing_web_xml: config.fail_on_missing_web_xml,
    }
}
