//! Packaging tasks.
//!
//! A build is an ordered list of [`PackagingTask`]s executed against one
//! [`PackagingContext`], followed by the [`PostPackagingTask`]s. The list is:
//!
//! 1. [`PackagingTask::CopyUserManifest`]
//! 2. [`PackagingTask::AnalyzeDependencies`] (only with caching enabled)
//! 3. One task per resolved overlay, in priority order:
//!    [`PackagingTask::PackageCurrentProject`] for the current project and
//!    [`PackagingTask::ApplyOverlay`] for the others.
//!
//! Every task is idempotent: running the list twice over the same webapp
//! directory gives the same result.

mod dependencies;
mod manifest;
mod overlay;
mod project;

use crate::context::PackagingContext;
use crate::error::Result;
use crate::overlay::Overlay;
use crate::overlay_manager::OverlayManager;
use crate::structure::RegistrationOutcome;
use crate::utils::webapp_file;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::File;
use std::fmt;

pub use dependencies::library_path;

/// One step of the packaging pipeline.
#[derive(Debug, Clone)]
pub enum PackagingTask {
    /// Copy `META-INF/MANIFEST.MF` from the webapp sources.
    CopyUserManifest,
    /// Remove files of dependencies that changed since the cached build.
    AnalyzeDependencies,
    /// Unpack and merge a dependency overlay.
    ApplyOverlay(Overlay),
    /// Copy the current project's resources, sources, classes and libraries.
    PackageCurrentProject(Overlay),
}

impl PackagingTask {
    /// Build the ordered task list for `overlays`.
    pub fn plan(overlays: &OverlayManager, use_cache: bool) -> Vec<PackagingTask> {
        let mut tasks = vec![PackagingTask::CopyUserManifest];
        if use_cache {
            tasks.push(PackagingTask::AnalyzeDependencies);
        }
        tasks.extend(overlays.overlays().iter().map(|overlay| {
            if overlay.is_current_project() {
                PackagingTask::PackageCurrentProject(overlay.clone())
            } else {
                PackagingTask::ApplyOverlay(overlay.clone())
            }
        }));
        tasks
    }

    /// Run the task. Errors are wrapped with the task name.
    pub fn perform(&self, context: &mut PackagingContext<'_>) -> Result<()> {
        tracing::info!("Running {}", self);
        let result = match self {
            PackagingTask::CopyUserManifest => manifest::copy_user_manifest(context),
            PackagingTask::AnalyzeDependencies => dependencies::analyze_dependencies(context),
            PackagingTask::ApplyOverlay(overlay) => overlay::apply_overlay(context, overlay),
            PackagingTask::PackageCurrentProject(overlay) => {
                project::package_current_project(context, overlay)
            }
        };
        result.map_err(|e| e.in_task(self.to_string()))
    }
}

impl fmt::Display for PackagingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackagingTask::CopyUserManifest => f.write_str("copy user manifest"),
            PackagingTask::AnalyzeDependencies => f.write_str("analyze dependencies"),
            PackagingTask::ApplyOverlay(overlay) => write!(f, "overlay [{}]", overlay.id),
            PackagingTask::PackageCurrentProject(_) => f.write_str("current project"),
        }
    }
}

/// Steps run once all packaging tasks succeeded.
#[derive(Debug, Clone)]
pub enum PostPackagingTask {
    /// Persist the webapp structure to the given cache file.
    SaveStructure(Utf8PathBuf),
}

impl PostPackagingTask {
    pub fn perform(&self, context: &mut PackagingContext<'_>) -> Result<()> {
        match self {
            PostPackagingTask::SaveStructure(path) => {
                tracing::info!("Saving webapp structure to {}", path);
                context
                    .structure()
                    .save(path)
                    .map_err(|e| e.in_task("save webapp structure"))
            }
        }
    }
}

/// How a file claimed by an owner should be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Skip,
    Copy,
    CopyIfModified,
}

/// Register `path` for `owner` and decide whether to write it.
///
/// Overriding claims take the path from any other owner of this run; the
/// first claim of an owner always wins over its later ones.
fn claim(context: &mut PackagingContext<'_>, owner: &str, path: &str, overriding: bool) -> Claim {
    let structure = context.structure_mut();

    if overriding {
        if let Some(current) = structure.get_owner(path).filter(|o| *o != owner) {
            tracing::info!("{} from [{}] replaces the one from [{}]", path, owner, current);
            structure.register_path_overriding(owner, path);
            return Claim::Copy;
        }
    }

    match structure.register_with_cache(owner, path) {
        RegistrationOutcome::Registered => Claim::Copy,
        RegistrationOutcome::AlreadyRegistered => Claim::CopyIfModified,
        RegistrationOutcome::Refused { owner: current } => {
            tracing::debug!(" - {} wasn't copied, it is already packaged for [{}]", path, current);
            Claim::Skip
        }
        RegistrationOutcome::Superseded { previous } => {
            tracing::info!("{} belonged to [{}] and will be overwritten", path, previous);
            Claim::Copy
        }
        RegistrationOutcome::SupersededUnknownOwner { previous } => {
            tracing::warn!(
                "{} belonged to [{}] which no longer exists in the project. \
                 Consider cleaning the webapp directory if the dependencies changed",
                path,
                previous
            );
            Claim::Copy
        }
    }
}

/// Options for [`copy_files`].
#[derive(Debug, Clone, Copy, Default)]
struct CopyOptions<'p> {
    target_prefix: &'p str,
    filtered: bool,
    overriding: bool,
}

/// Copy `files` (relative to `base`) into the webapp under `owner`.
///
/// Returns the number of files written.
fn copy_files(
    context: &mut PackagingContext<'_>,
    owner: &str,
    base: &Utf8Path,
    files: &[String],
    options: CopyOptions<'_>,
) -> Result<usize> {
    let mut copied = 0;
    for file in files {
        let source = webapp_file(base, file);
        let target = format!("{}{}", options.target_prefix, file);
        let filtered = options.filtered && !context.is_non_filtered_extension(file);
        if copy_file(context, owner, &source, &target, filtered, options.overriding)? {
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copy a single file to `target` (a webapp path) if `owner` may claim it.
fn copy_file(
    context: &mut PackagingContext<'_>,
    owner: &str,
    source: &Utf8Path,
    target: &str,
    filtered: bool,
    overriding: bool,
) -> Result<bool> {
    let claim = claim(context, owner, target, overriding);
    if claim == Claim::Skip {
        return Ok(false);
    }
    write_file(context, source, target, filtered, claim == Claim::CopyIfModified)
}

/// Copy `source` to `target` for `owner` whoever supplied `target` before,
/// including earlier steps of `owner` itself.
fn replace_file(
    context: &mut PackagingContext<'_>,
    owner: &str,
    source: &Utf8Path,
    target: &str,
    filtered: bool,
) -> Result<()> {
    let structure = context.structure_mut();
    match structure.get_owner(target) {
        Some(current) if current == owner => {
            tracing::warn!("{} is replaced by the configured {}", target, source)
        }
        Some(current) => {
            tracing::info!("{} from [{}] is replaced by the configured {}", target, current, source)
        }
        None => {}
    }
    structure.register_path_overriding(owner, target);

    write_file(context, source, target, filtered, false)?;
    Ok(())
}

fn write_file(
    context: &PackagingContext<'_>,
    source: &Utf8Path,
    target: &str,
    filtered: bool,
    only_if_modified: bool,
) -> Result<bool> {
    let dest = webapp_file(context.webapp_directory(), target);
    if filtered {
        context.copy_filtered(source, &dest)?;
        tracing::debug!(" + {} has been copied (filtered)", target);
        return Ok(true);
    }

    let written = copy_preserving_time(
        source,
        &dest,
        only_if_modified,
        context.preserve_permissions(),
    )?;
    if written {
        tracing::debug!(" + {} has been copied", target);
    } else {
        tracing::debug!(" * {} is up to date", target);
    }
    Ok(written)
}

/// Copy `source` to `dest` keeping its modification time.
///
/// With `only_if_modified`, nothing is written when `dest` is at least as
/// recent as `source`.
pub(crate) fn copy_preserving_time(
    source: &Utf8Path,
    dest: &Utf8Path,
    only_if_modified: bool,
    preserve_permissions: bool,
) -> Result<bool> {
    let source_meta = std::fs::metadata(source.as_std_path())?;
    let source_time = source_meta.modified()?;

    if only_if_modified {
        if let Some(dest_time) = crate::archive::modified(dest)? {
            if dest_time >= source_time {
                return Ok(false);
            }
        }
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent.as_std_path())?;
    }
    std::fs::copy(source.as_std_path(), dest.as_std_path())?;

    #[cfg(unix)]
    if !preserve_permissions {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dest.as_std_path(), std::fs::Permissions::from_mode(0o644))?;
    }
    #[cfg(not(unix))]
    let _ = preserve_permissions;

    File::options()
        .write(true)
        .open(dest.as_std_path())?
        .set_modified(source_time)?;
    Ok(true)
}

/// Create `directories` (webapp relative, below `target_prefix`).
fn create_directories(
    context: &PackagingContext<'_>,
    target_prefix: &str,
    directories: &[String],
) -> Result<()> {
    for directory in directories {
        let path = webapp_file(context.webapp_directory(), &format!("{}{}", target_prefix, directory));
        std::fs::create_dir_all(path.as_std_path())?;
    }
    Ok(())
}
