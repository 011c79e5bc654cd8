//! Shared state of a packaging run.

use crate::error::{Error, Result};
use crate::filter::{
    check_encoding, has_extension, load_properties, Delimiter, FileFilter, TokenFilter,
    DEFAULT_DELIMITERS, DEFAULT_NON_FILTERED_EXTENSIONS,
};
use crate::overlay::escapes_webapp;
use crate::overlay_manager::OverlayManager;
use crate::structure::{CacheLoad, WebappStructure};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::sync::Arc;
use war_project::WarProject;

/// Configuration and state shared by every packaging task of a run.
///
/// The context owns the [`WebappStructure`] being built. Tasks run one after
/// the other and receive the context by mutable reference.
pub struct PackagingContext<'a> {
    project: &'a WarProject,
    webapp_directory: Utf8PathBuf,
    work_directory: Utf8PathBuf,
    overlay_ids: Vec<String>,
    filter_wrappers: Vec<Arc<dyn FileFilter>>,
    non_filtered_extensions: Vec<String>,
    structure: WebappStructure,
    previous_structure: Option<WebappStructure>,
}

impl<'a> PackagingContext<'a> {
    /// Assemble the context for `project`.
    ///
    /// With caching enabled, a fresh `cache` is consulted for registration
    /// outcomes and a stale one is kept only for dependency analysis. Every
    /// overlay id gets an (empty) bucket in the structure up front.
    pub fn new(project: &'a WarProject, overlays: &OverlayManager, cache: CacheLoad) -> Result<Self> {
        let config = &project.war;
        check_encoding(config.resource_encoding.as_deref())?;
        if let Some(target_path) = config
            .web_resources
            .iter()
            .filter_map(|resource| resource.target_path.as_deref())
            .find(|target_path| escapes_webapp(target_path))
        {
            return Err(Error::InvalidTargetPath(target_path.to_string()));
        }

        let mut structure = WebappStructure::new(&project.dependencies);
        let mut previous_structure = None;
        if config.use_cache {
            match cache {
                CacheLoad::Fresh(previous) => {
                    structure = WebappStructure::with_cache(&project.dependencies, previous);
                }
                CacheLoad::Stale(previous) => {
                    tracing::info!("Dependencies changed since the last build, webapp cache ignored");
                    previous_structure = Some(previous);
                }
                CacheLoad::Missing => {}
            }
        }

        let overlay_ids = overlays
            .overlay_ids()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        for id in &overlay_ids {
            structure.get_structure(id);
        }

        let filter_wrappers = build_filter_wrappers(project)?;

        let mut non_filtered_extensions = DEFAULT_NON_FILTERED_EXTENSIONS
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>();
        non_filtered_extensions.extend(
            config
                .non_filtered_file_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string()),
        );

        Ok(Self {
            project,
            webapp_directory: project.webapp_directory(),
            work_directory: project.work_directory(),
            overlay_ids,
            filter_wrappers,
            non_filtered_extensions,
            structure,
            previous_structure,
        })
    }

    pub fn project(&self) -> &'a WarProject {
        self.project
    }

    pub fn webapp_directory(&self) -> &Utf8Path {
        &self.webapp_directory
    }

    pub fn work_directory(&self) -> &Utf8Path {
        &self.work_directory
    }

    /// Overlay ids in priority order.
    pub fn overlay_ids(&self) -> &[String] {
        &self.overlay_ids
    }

    pub fn filter_wrappers(&self) -> &[Arc<dyn FileFilter>] {
        &self.filter_wrappers
    }

    pub fn non_filtered_extensions(&self) -> &[String] {
        &self.non_filtered_extensions
    }

    pub fn is_non_filtered_extension(&self, file_name: &str) -> bool {
        has_extension(file_name, &self.non_filtered_extensions)
    }

    /// Dependency types applied as overlays rather than copied as libraries.
    pub fn is_overlay_type(&self, kind: &str) -> bool {
        self.project.war.overlay_types.iter().any(|t| t == kind)
    }

    pub fn use_cache(&self) -> bool {
        self.project.war.use_cache
    }

    pub fn archive_classes(&self) -> bool {
        self.project.war.archive_classes
    }

    pub fn include_empty_directories(&self) -> bool {
        self.project.war.include_empty_directories
    }

    pub fn filtering_deployment_descriptors(&self) -> bool {
        self.project.war.filtering_deployment_descriptors
    }

    pub fn preserve_permissions(&self) -> bool {
        self.project.war.preserve_permissions
    }

    pub fn structure(&self) -> &WebappStructure {
        &self.structure
    }

    pub fn structure_mut(&mut self) -> &mut WebappStructure {
        &mut self.structure
    }

    /// Stale record of a previous build, if one was found.
    pub fn previous_structure(&self) -> Option<&WebappStructure> {
        self.previous_structure.as_ref()
    }

    pub(crate) fn previous_structure_mut(&mut self) -> Option<&mut WebappStructure> {
        self.previous_structure.as_mut()
    }

    /// Consume the context, returning the assembled structure.
    pub fn into_structure(self) -> WebappStructure {
        self.structure
    }

    /// Copy `source` to `dest`, running its text through the filter wrappers.
    ///
    /// Content that is not valid UTF-8 is copied as is.
    pub fn copy_filtered(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
        let bytes = std::fs::read(source.as_std_path())?;
        let contents = match String::from_utf8(bytes) {
            Ok(text) => self
                .filter_wrappers
                .iter()
                .fold(text, |text, wrapper| wrapper.filter(&text))
                .into_bytes(),
            Err(e) => {
                tracing::debug!("{} is not text, copied without filtering", source);
                e.into_bytes()
            }
        };

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }
        std::fs::write(dest.as_std_path(), contents)?;
        Ok(())
    }
}

/// Token filter over the project properties and configured filter files.
fn build_filter_wrappers(project: &WarProject) -> Result<Vec<Arc<dyn FileFilter>>> {
    let config = &project.war;

    let mut specs = Vec::new();
    if config.use_default_delimiters || config.delimiters.is_empty() {
        specs.extend(DEFAULT_DELIMITERS.iter().map(|d| d.to_string()));
    }
    for delimiter in &config.delimiters {
        if !specs.contains(delimiter) {
            specs.push(delimiter.clone());
        }
    }
    let delimiters = specs
        .iter()
        .map(|spec| Delimiter::parse(spec))
        .collect::<Result<Vec<_>>>()?;

    let mut properties = BTreeMap::new();
    properties.insert("project.groupId".to_string(), project.group_id.clone());
    properties.insert("project.artifactId".to_string(), project.artifact_id.clone());
    properties.insert("project.version".to_string(), project.version.clone());
    properties.insert("project.build.finalName".to_string(), project.final_name());
    properties.extend(project.properties.clone());
    for filter in &config.filters {
        properties.extend(load_properties(filter)?);
    }

    let filter = TokenFilter::new(delimiters, properties).with_escape_string(config.escape_string.clone());
    Ok(vec![Arc::new(filter)])
}
