use super::{copy_files, create_directories, CopyOptions};
use crate::archive::{unpack_if_modified, MANIFEST_PATH};
use crate::context::PackagingContext;
use crate::error::{Error, Result};
use crate::overlay::Overlay;
use crate::scanner::{DirectoryScanner, PatternSet};

/// Merge the content of a dependency overlay into the webapp.
///
/// The archive is unpacked into the work directory (unless an up to date
/// extraction is already there) and every selected file the overlay may claim
/// is copied below the overlay's target path.
pub(super) fn apply_overlay(context: &mut PackagingContext<'_>, overlay: &Overlay) -> Result<()> {
    if overlay.skip {
        tracing::info!("Skipping overlay [{}]", overlay);
        return Ok(());
    }
    let Some(artifact) = overlay.artifact.as_ref() else {
        return Ok(());
    };
    let Some(archive) = artifact.file.as_ref() else {
        return Err(Error::MissingArtifactFile {
            artifact: artifact.to_string(),
            path: artifact.default_file_name().into(),
        });
    };
    let Some(unpacked) = overlay.unpack_directory(context.work_directory()) else {
        return Ok(());
    };

    unpack_if_modified(archive, &unpacked, context.preserve_permissions()).map_err(|e| {
        Error::Unpack {
            overlay: overlay.id.clone(),
            source: Box::new(e),
        }
    })?;

    // The overlay's own manifest never makes it into the webapp.
    let mut excludes = overlay.excludes.clone();
    excludes.push(MANIFEST_PATH.to_string());
    let patterns = PatternSet::new(overlay.includes.as_slice(), excludes.as_slice())?;
    let scan = DirectoryScanner::new(&unpacked, patterns).scan()?;

    let target_prefix = overlay.target_prefix();
    let copied = copy_files(
        context,
        &overlay.id,
        &unpacked,
        &scan.files,
        CopyOptions {
            target_prefix: &target_prefix,
            filtered: overlay.filtered,
            overriding: false,
        },
    )?;
    if context.include_empty_directories() {
        create_directories(context, &target_prefix, &scan.directories)?;
    }
    context
        .structure_mut()
        .register_overlay_artifact(artifact, &overlay.id);

    tracing::info!(
        "Overlay [{}]: {} of {} files copied",
        overlay.id,
        copied,
        scan.files.len()
    );
    Ok(())
}
