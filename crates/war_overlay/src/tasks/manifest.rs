use super::copy_file;
use crate::archive::MANIFEST_PATH;
use crate::context::PackagingContext;
use crate::error::Result;
use crate::overlay::CURRENT_BUILD_ID;
use crate::utils::webapp_file;

/// Copy the user's `META-INF/MANIFEST.MF` from the webapp sources, if any.
pub(super) fn copy_user_manifest(context: &mut PackagingContext<'_>) -> Result<()> {
    let source = webapp_file(&context.project().war_source_directory(), MANIFEST_PATH);
    if !source.as_std_path().is_file() {
        tracing::debug!("No user manifest in {}", source);
        return Ok(());
    }

    copy_file(context, CURRENT_BUILD_ID, &source, MANIFEST_PATH, false, true)?;
    Ok(())
}
