//! Project model and configuration types for WAR overlay packaging.
//!
//! A [`WarProject`] is what the host build hands to the packaging engine: the
//! project coordinates, its already-resolved [`Dependency`] list and the
//! [`WarConfig`] describing how the webapp is assembled. It is read from a
//! `war.config.json` or `war.config.toml` file next to the project sources.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

mod dependency;

pub use dependency::{Dependency, Scope};

/// Config file names, in lookup order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["war.config.json", "war.config.toml"];

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("No war.config.json or war.config.toml found in {0}")]
    ConfigNotFound(Utf8PathBuf),

    #[error("Unsupported config file extension: {0}")]
    UnsupportedFormat(Utf8PathBuf),
}

/// Describes a project to be packaged as a web application archive.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WarProject {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,

    /// Base name of the assembled webapp and of the archive.
    ///
    /// Defaults to `artifactId-version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_name: Option<String>,

    /// Properties available to resource filtering (`${name}` tokens).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    /// Resolved dependencies, in resolution order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    #[serde(default)]
    pub war: WarConfig,

    /// Directory containing the config file; relative paths resolve against it.
    #[serde(skip)]
    pub basedir: Utf8PathBuf,
}

/// Packaging configuration.
///
/// Every field has a default so an empty `[war]` table is a valid config.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WarConfig {
    /// Where the exploded webapp is assembled. Default: `target/<final_name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webapp_directory: Option<Utf8PathBuf>,

    /// Static webapp sources. Default: `src/main/webapp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub war_source_directory: Option<Utf8PathBuf>,

    /// Compiled classes copied to `WEB-INF/classes`. Default: `target/classes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes_directory: Option<Utf8PathBuf>,

    /// Overlay unpack area. Default: `target/war/work`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_directory: Option<Utf8PathBuf>,

    /// Webapp structure cache. Default: `target/war/work/webapp-cache.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<Utf8PathBuf>,

    /// Where the archive is written. Default: `target`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<Utf8PathBuf>,

    /// Explicit deployment descriptor, copied to `WEB-INF/web.xml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_xml: Option<Utf8PathBuf>,

    /// Container specific descriptor (e.g. `context.xml`), copied to `META-INF/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_config_xml: Option<Utf8PathBuf>,

    #[serde(default)]
    pub use_cache: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub web_resources: Vec<Resource>,

    /// Explicit overlays, in priority order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlays: Vec<OverlayConfig>,

    /// Dependency types that become implicit overlays.
    #[serde(default = "default_overlay_types")]
    pub overlay_types: Vec<String>,

    /// Comma separated include patterns for the webapp sources.
    #[serde(default = "default_includes")]
    pub war_source_includes: String,

    /// Comma separated exclude patterns for the webapp sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub war_source_excludes: Option<String>,

    /// Comma separated include patterns applied when creating the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging_includes: Option<String>,

    /// Comma separated exclude patterns applied when creating the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging_excludes: Option<String>,

    /// `.properties` files merged into the filtering properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Utf8PathBuf>,

    /// Extra token delimiters, e.g. `${*}` or `@`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delimiters: Vec<String>,

    #[serde(default = "default_true")]
    pub use_default_delimiters: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escape_string: Option<String>,

    /// Extensions never filtered, in addition to the built-in image types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_filtered_file_extensions: Vec<String>,

    #[serde(default)]
    pub filtering_deployment_descriptors: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_encoding: Option<String>,

    #[serde(default)]
    pub include_empty_directories: bool,

    /// Jar `WEB-INF/classes` into `WEB-INF/lib` instead of copying it.
    #[serde(default)]
    pub archive_classes: bool,

    /// Keep unix permission bits of copied and extracted files.
    #[serde(default = "default_true", alias = "use_jvm_chmod")]
    pub preserve_permissions: bool,

    #[serde(default = "default_true")]
    pub fail_on_missing_web_xml: bool,

    /// Library file name template, e.g. `@{artifactId}@.@{extension}@`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_name_mapping: Option<String>,
}

impl Default for WarConfig {
    fn default() -> Self {
        Self {
            webapp_directory: None,
            war_source_directory: None,
            classes_directory: None,
            work_directory: None,
            cache_file: None,
            output_directory: None,
            web_xml: None,
            container_config_xml: None,
            use_cache: false,
            web_resources: Vec::new(),
            overlays: Vec::new(),
            overlay_types: default_overlay_types(),
            war_source_includes: default_includes(),
            war_source_excludes: None,
            packaging_includes: None,
            packaging_excludes: None,
            filters: Vec::new(),
            delimiters: Vec::new(),
            use_default_delimiters: true,
            escape_string: None,
            non_filtered_file_extensions: Vec::new(),
            filtering_deployment_descriptors: false,
            resource_encoding: None,
            include_empty_directories: false,
            archive_classes: false,
            preserve_permissions: true,
            fail_on_missing_web_xml: true,
            output_file_name_mapping: None,
        }
    }
}

/// A set of extra web resources copied into the webapp.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Resource {
    pub directory: Utf8PathBuf,

    /// Sub directory of the webapp the files land in. `.` means the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,

    #[serde(default)]
    pub filtering: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,
}

/// An explicitly configured overlay.
///
/// An entry without `group_id` and `artifact_id` stands for the current
/// project and only serves to position it among the other overlays.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,

    #[serde(rename = "type", default = "default_overlay_type")]
    pub kind: String,

    /// Comma separated include patterns.
    #[serde(default = "default_includes")]
    pub includes: String,

    /// Comma separated exclude patterns.
    #[serde(default)]
    pub excludes: String,

    #[serde(default)]
    pub filtered: bool,

    #[serde(default)]
    pub skip: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            id: None,
            group_id: None,
            artifact_id: None,
            classifier: None,
            kind: default_overlay_type(),
            includes: default_includes(),
            excludes: String::new(),
            filtered: false,
            skip: false,
            target_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_includes() -> String {
    "**".to_string()
}

fn default_overlay_type() -> String {
    "war".to_string()
}

fn default_overlay_types() -> Vec<String> {
    vec!["war".to_string(), "jar".to_string()]
}

impl WarProject {
    /// Locate the config file in `project_dir`, JSON first, then TOML.
    pub fn find_config(project_dir: &Utf8Path) -> Result<Utf8PathBuf, ProjectError> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| project_dir.join(name))
            .find(|path| path.as_std_path().exists())
            .ok_or_else(|| ProjectError::ConfigNotFound(project_dir.to_path_buf()))
    }

    /// Load a project from a config file and resolve its relative paths.
    pub fn load(config_path: &Utf8Path) -> Result<Self, ProjectError> {
        let contents = std::fs::read_to_string(config_path.as_std_path())?;
        let mut project: WarProject = match config_path.extension() {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") => toml::from_str(&contents)?,
            _ => return Err(ProjectError::UnsupportedFormat(config_path.to_path_buf())),
        };

        project.basedir = match config_path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        project.resolve_paths();
        Ok(project)
    }

    /// `final_name`, or `artifactId-version`.
    pub fn final_name(&self) -> String {
        self.final_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.artifact_id, self.version))
    }

    /// Resolve `path` against the project base directory.
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.basedir.join(path)
        }
    }

    pub fn build_directory(&self) -> Utf8PathBuf {
        self.basedir.join("target")
    }

    pub fn webapp_directory(&self) -> Utf8PathBuf {
        self.war
            .webapp_directory
            .clone()
            .unwrap_or_else(|| self.build_directory().join(self.final_name()))
    }

    pub fn war_source_directory(&self) -> Utf8PathBuf {
        self.war
            .war_source_directory
            .clone()
            .unwrap_or_else(|| self.basedir.join("src").join("main").join("webapp"))
    }

    pub fn classes_directory(&self) -> Utf8PathBuf {
        self.war
            .classes_directory
            .clone()
            .unwrap_or_else(|| self.build_directory().join("classes"))
    }

    pub fn work_directory(&self) -> Utf8PathBuf {
        self.war
            .work_directory
            .clone()
            .unwrap_or_else(|| self.build_directory().join("war").join("work"))
    }

    pub fn cache_file(&self) -> Utf8PathBuf {
        self.war
            .cache_file
            .clone()
            .unwrap_or_else(|| self.work_directory().join("webapp-cache.json"))
    }

    pub fn output_directory(&self) -> Utf8PathBuf {
        self.war
            .output_directory
            .clone()
            .unwrap_or_else(|| self.build_directory())
    }

    fn resolve_paths(&mut self) {
        let resolve = |basedir: &Utf8Path, path: &mut Utf8PathBuf| {
            if !path.is_absolute() {
                *path = basedir.join(&*path);
            }
        };
        let basedir = self.basedir.clone();

        for dependency in &mut self.dependencies {
            if let Some(file) = dependency.file.as_mut() {
                resolve(&basedir, file);
            }
        }
        for resource in &mut self.war.web_resources {
            resolve(&basedir, &mut resource.directory);
        }
        for filter in &mut self.war.filters {
            resolve(&basedir, filter);
        }
        for path in [
            &mut self.war.webapp_directory,
            &mut self.war.war_source_directory,
            &mut self.war.classes_directory,
            &mut self.war.work_directory,
            &mut self.war.cache_file,
            &mut self.war.output_directory,
            &mut self.war.web_xml,
            &mut self.war.container_config_xml,
        ]
        .into_iter()
        .flatten()
        {
            resolve(&basedir, path);
        }
    }
}
