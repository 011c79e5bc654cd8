//! Packaging of the current project.
//!
//! The current project is processed in a fixed order: extra web resources,
//! the webapp sources, the deployment descriptors, the compiled classes and
//! finally the library dependencies. All its claims are overriding, so files
//! it shares with overlays always come from the project. Between its own
//! steps the first claim wins, which lets web resources shadow sources.

use super::dependencies::LIB_PATH;
use super::{copy_file, copy_files, create_directories, library_path, replace_file, CopyOptions};
use crate::archive::{create_jar, WEB_XML_PATH};
use crate::context::PackagingContext;
use crate::error::{Error, Result};
use crate::overlay::{normalize_target_path, split_patterns, Overlay};
use crate::scanner::{DirectoryScanner, PatternSet};
use crate::utils::map_file_name;
use std::collections::HashMap;
use war_project::Dependency;

const DEFAULT_CONTAINER_CONFIG_NAME: &str = "context.xml";

pub(super) fn package_current_project(
    context: &mut PackagingContext<'_>,
    overlay: &Overlay,
) -> Result<()> {
    let owner = overlay.id.as_str();
    copy_web_resources(context, owner)?;
    copy_webapp_sources(context, overlay)?;
    copy_deployment_descriptors(context, owner)?;
    copy_classes(context, owner)?;
    copy_libraries(context, owner)?;
    Ok(())
}

fn copy_web_resources(context: &mut PackagingContext<'_>, owner: &str) -> Result<()> {
    let project = context.project();

    for resource in &project.war.web_resources {
        if !resource.directory.as_std_path().is_dir() {
            tracing::warn!(
                "Not copying webapp webResources [{}]: web resource directory does not exist",
                resource.directory
            );
            continue;
        }

        let patterns = PatternSet::new(resource.includes.as_slice(), resource.excludes.as_slice())?
            .with_default_excludes()?;
        let scan = DirectoryScanner::new(&resource.directory, patterns).scan()?;
        let target_prefix = normalize_target_path(resource.target_path.as_deref());

        let copied = copy_files(
            context,
            owner,
            &resource.directory,
            &scan.files,
            CopyOptions {
                target_prefix: &target_prefix,
                filtered: resource.filtering,
                overriding: true,
            },
        )?;
        tracing::info!(
            "Copied {} web resources from {}",
            copied,
            resource.directory
        );
    }
    Ok(())
}

fn copy_webapp_sources(context: &mut PackagingContext<'_>, overlay: &Overlay) -> Result<()> {
    let project = context.project();
    let config = &project.war;
    let source_directory = project.war_source_directory();

    if overlay.skip {
        tracing::info!("Skipping webapp sources of the current project");
        return Ok(());
    }
    if !source_directory.as_std_path().is_dir() {
        tracing::debug!("Webapp source directory {} does not exist", source_directory);
        return Ok(());
    }

    let includes = split_patterns(&config.war_source_includes);
    let mut excludes = config
        .war_source_excludes
        .as_deref()
        .map(split_patterns)
        .unwrap_or_default();
    if config.web_xml.is_some() {
        excludes.push(WEB_XML_PATH.to_string());
    }
    if let Some(container_config) = &config.container_config_xml {
        let name = container_config
            .file_name()
            .unwrap_or(DEFAULT_CONTAINER_CONFIG_NAME);
        excludes.push(format!("META-INF/{}", name));
    }

    let patterns = PatternSet::new(includes.as_slice(), excludes.as_slice())?.with_default_excludes()?;
    let selection = PatternSet::new(overlay.includes.as_slice(), overlay.excludes.as_slice())?;
    let scan = DirectoryScanner::new(&source_directory, patterns).scan()?;

    let (descriptors, files): (Vec<String>, Vec<String>) = scan
        .files
        .iter()
        .filter(|file| selection.is_included(file))
        .cloned()
        .partition(|file| file == WEB_XML_PATH);

    let filter_descriptors = context.filtering_deployment_descriptors();
    tracing::info!("Copying webapp sources [{}]", source_directory);
    let mut copied = copy_files(
        context,
        &overlay.id,
        &source_directory,
        &files,
        CopyOptions {
            overriding: true,
            ..CopyOptions::default()
        },
    )?;
    copied += copy_files(
        context,
        &overlay.id,
        &source_directory,
        &descriptors,
        CopyOptions {
            filtered: filter_descriptors,
            overriding: true,
            ..CopyOptions::default()
        },
    )?;

    if context.include_empty_directories() {
        create_directories(context, "", &scan.directories)?;
    }
    tracing::debug!("{} webapp source files copied", copied);
    Ok(())
}

fn copy_deployment_descriptors(context: &mut PackagingContext<'_>, owner: &str) -> Result<()> {
    let config = &context.project().war;
    let filtered = context.filtering_deployment_descriptors();

    if let Some(web_xml) = &config.web_xml {
        if !web_xml.as_std_path().is_file() {
            return Err(Error::WebXmlNotFound(web_xml.clone()));
        }
        replace_file(context, owner, web_xml, WEB_XML_PATH, filtered)?;
    }

    if let Some(container_config) = &config.container_config_xml {
        let name = container_config
            .file_name()
            .unwrap_or(DEFAULT_CONTAINER_CONFIG_NAME);
        replace_file(
            context,
            owner,
            container_config,
            &format!("META-INF/{}", name),
            filtered,
        )?;
    }
    Ok(())
}

fn copy_classes(context: &mut PackagingContext<'_>, owner: &str) -> Result<()> {
    let project = context.project();
    let classes = project.classes_directory();
    if !classes.as_std_path().is_dir() {
        return Ok(());
    }

    if context.archive_classes() {
        let file_name = format!("{}-{}.jar", project.artifact_id, project.version);
        let jar = context.work_directory().join(&file_name);
        if let Some(parent) = jar.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }
        let entries = create_jar(&classes, &jar, context.preserve_permissions())?;
        tracing::info!("Archived {} class files into {}", entries, file_name);
        copy_file(context, owner, &jar, &format!("{}{}", LIB_PATH, file_name), false, true)?;
    } else {
        let patterns = PatternSet::new::<&str>(&[], &[])?.with_default_excludes()?;
        let scan = DirectoryScanner::new(&classes, patterns).scan()?;
        let copied = copy_files(
            context,
            owner,
            &classes,
            &scan.files,
            CopyOptions {
                target_prefix: "WEB-INF/classes/",
                filtered: false,
                overriding: true,
            },
        )?;
        tracing::debug!("{} class files copied", copied);
    }
    Ok(())
}

/// Copy bundled dependencies that are not overlays to their library folder.
///
/// Libraries sharing a file name are disambiguated with a `groupId-` prefix.
fn copy_libraries(context: &mut PackagingContext<'_>, owner: &str) -> Result<()> {
    let project = context.project();

    let mut libraries = Vec::new();
    for dependency in &project.dependencies {
        if !dependency.is_bundled() || context.is_overlay_type(&dependency.kind) {
            continue;
        }
        if library_path(&dependency.kind, "").is_none() {
            tracing::debug!("Dependency [{}] of type {} is not copied", dependency, dependency.kind);
            continue;
        }
        libraries.push((dependency, library_file_name(context, dependency)));
    }

    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for (_, name) in &libraries {
        *name_counts.entry(name.as_str()).or_default() += 1;
    }
    let libraries = libraries
        .iter()
        .map(|(dependency, name)| {
            let name = if name_counts.get(name.as_str()).copied().unwrap_or_default() > 1 {
                format!("{}-{}", dependency.group_id, name)
            } else {
                name.clone()
            };
            (*dependency, name)
        })
        .collect::<Vec<_>>();

    for (dependency, name) in libraries {
        let source = match dependency.file.as_ref() {
            Some(file) if file.as_std_path().is_file() => file,
            other => {
                return Err(Error::MissingArtifactFile {
                    artifact: dependency.to_string(),
                    path: other
                        .cloned()
                        .unwrap_or_else(|| dependency.default_file_name().into()),
                })
            }
        };
        let Some(target) = library_path(&dependency.kind, &name) else {
            continue;
        };
        copy_file(context, owner, source, &target, false, true)?;
        context
            .structure_mut()
            .register_target_file_name(dependency, &name);
    }
    Ok(())
}

fn library_file_name(context: &PackagingContext<'_>, dependency: &Dependency) -> String {
    match context.project().war.output_file_name_mapping.as_deref() {
        Some(mapping) => map_file_name(mapping, dependency),
        None => dependency.default_file_name(),
    }
}
