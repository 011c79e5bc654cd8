use crate::archive::unpack_marker;
use crate::context::PackagingContext;
use crate::error::Result;
use crate::overlay::Overlay;
use crate::structure::{DependencyChange, WebappStructure};
use crate::utils::webapp_file;
use camino::Utf8Path;
use war_project::Dependency;

pub const LIB_PATH: &str = "WEB-INF/lib/";
pub const TLD_PATH: &str = "WEB-INF/tld/";
pub const SERVICES_PATH: &str = "WEB-INF/services/";

/// Webapp path a library of type `kind` is copied to under `file_name`.
///
/// `None` for types that are never copied as libraries.
pub fn library_path(kind: &str, file_name: &str) -> Option<String> {
    match kind {
        "jar" | "ejb" | "ejb-client" | "test-jar" => Some(format!("{}{}", LIB_PATH, file_name)),
        "tld" => Some(format!("{}{}", TLD_PATH, file_name)),
        "aar" => Some(format!("{}{}", SERVICES_PATH, file_name)),
        "par" => {
            let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
            Some(format!("{}{}.jar", LIB_PATH, stem))
        }
        _ => None,
    }
}

/// Delete what the previous build copied for dependencies that were removed
/// or changed since.
///
/// Only runs against a stale record: a fresh one was made for the same
/// dependency set, so nothing can have changed.
pub(super) fn analyze_dependencies(context: &mut PackagingContext<'_>) -> Result<()> {
    let Some(previous) = context.previous_structure() else {
        tracing::debug!("No previous build to compare dependencies with");
        return Ok(());
    };

    let mut stale = Vec::new();
    for change in context.structure().analyse_dependencies(previous) {
        match change {
            DependencyChange::Unchanged(dependency) => {
                tracing::debug!("Dependency [{}] has not changed since last build", dependency);
            }
            DependencyChange::New(dependency) => {
                tracing::debug!("New dependency [{}]", dependency);
            }
            DependencyChange::Removed(dependency) => {
                if dependency.is_bundled() {
                    tracing::info!("Dependency [{}] has been removed from the project", dependency);
                    stale.push(dependency);
                } else {
                    tracing::debug!(
                        "Dependency [{}] has been removed but it was not bundled anyway",
                        dependency
                    );
                }
            }
            DependencyChange::UpdatedVersion {
                dependency,
                previous_version,
            } => {
                tracing::info!(
                    "Version of dependency [{}] has changed ({} -> {})",
                    dependency,
                    previous_version,
                    dependency.version
                );
                stale.push(dependency);
            }
            DependencyChange::UpdatedScope {
                dependency,
                previous_scope,
            } => {
                if previous_scope.is_bundled() && !dependency.scope.is_bundled() {
                    tracing::info!(
                        "Scope of dependency [{}] has changed ({} -> {})",
                        dependency,
                        previous_scope,
                        dependency.scope
                    );
                    stale.push(dependency);
                }
            }
            DependencyChange::UpdatedOptional {
                dependency,
                previous_optional,
            } => {
                if !previous_optional && dependency.optional {
                    tracing::info!("Dependency [{}] is now optional", dependency);
                    stale.push(dependency);
                }
            }
            DependencyChange::UpdatedUnknown {
                dependency,
                previous,
            } => {
                tracing::info!("Dependency [{}] has changed (was {})", dependency, previous);
                stale.push(dependency);
            }
        }
    }

    let webapp = context.webapp_directory().to_path_buf();
    let work = context.work_directory().to_path_buf();
    if let Some(previous) = context.previous_structure_mut() {
        for dependency in &stale {
            remove_dependency(&webapp, &work, previous, dependency)?;
        }
    }
    Ok(())
}

/// Delete the files `previous` recorded for `dependency` and drop their
/// registrations.
fn remove_dependency(
    webapp: &Utf8Path,
    work: &Utf8Path,
    previous: &mut WebappStructure,
    dependency: &Dependency,
) -> Result<()> {
    let Some(record) = previous.dependency_record(dependency).cloned() else {
        tracing::warn!("Dependency [{}] is not part of the previous build", dependency);
        return Ok(());
    };

    if let Some(overlay_id) = &record.overlay_id {
        let paths = previous.unregister_owner(overlay_id);
        tracing::info!(
            "Removing {} files of overlay [{}]",
            paths.len(),
            overlay_id
        );
        for path in &paths {
            remove_file(&webapp_file(webapp, path))?;
        }

        if let Some(unpacked) = Overlay::implicit(&record.dependency).unpack_directory(work) {
            if unpacked.as_std_path().is_dir() {
                std::fs::remove_dir_all(unpacked.as_std_path())?;
            }
            remove_file(&unpack_marker(&unpacked))?;
        }
    }

    match &record.target_file_name {
        Some(file_name) => match library_path(&record.dependency.kind, file_name) {
            Some(path) => {
                previous.unregister_path(&path);
                let file = webapp_file(webapp, &path);
                if file.as_std_path().exists() {
                    tracing::debug!("Removing file [{}]", file);
                    remove_file(&file)?;
                } else {
                    tracing::warn!("File to remove [{}] has not been found", file);
                }
            }
            None => tracing::error!("Could not get file from dependency [{}]", dependency),
        },
        None if record.overlay_id.is_none() => {
            tracing::warn!(
                "Could not retrieve the target file name of dependency [{}]",
                dependency
            );
        }
        None => {}
    }
    Ok(())
}

fn remove_file(path: &Utf8Path) -> Result<()> {
    match std::fs::remove_file(path.as_std_path()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay_manager::OverlayManager;
    use crate::structure::CacheLoad;
    use war_project::{Scope, WarConfig, WarProject};

    #[test]
    fn test_library_path() {
        assert_eq!(library_path("jar", "a-1.jar").as_deref(), Some("WEB-INF/lib/a-1.jar"));
        assert_eq!(library_path("tld", "t.tld").as_deref(), Some("WEB-INF/tld/t.tld"));
        assert_eq!(library_path("aar", "s.aar").as_deref(), Some("WEB-INF/services/s.aar"));
        assert_eq!(library_path("par", "p-1.par").as_deref(), Some("WEB-INF/lib/p-1.jar"));
        assert_eq!(library_path("war", "w.war"), None);
    }

    #[test]
    fn test_removes_files_of_changed_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let old_lib = Dependency::new("g", "lib", "1.0", "jar");
        let kept = Dependency::new("g", "kept", "1.0", "jar");
        let now_provided = Dependency::new("g", "api", "1.0", "jar");
        let old_skin = Dependency::new("g", "skin", "1.0", "war").with_file(root.join("skin-1.0.war"));

        let mut previous = WebappStructure::new(&[
            old_lib.clone(),
            kept.clone(),
            now_provided.clone(),
            old_skin.clone(),
        ]);
        previous.register_path("currentBuild", "WEB-INF/lib/lib-1.0.jar");
        previous.register_target_file_name(&old_lib, "lib-1.0.jar");
        previous.register_path("currentBuild", "WEB-INF/lib/kept-1.0.jar");
        previous.register_target_file_name(&kept, "kept-1.0.jar");
        previous.register_path("currentBuild", "WEB-INF/lib/api-1.0.jar");
        previous.register_target_file_name(&now_provided, "api-1.0.jar");
        previous.register_path("g:skin", "css/skin.css");
        previous.register_overlay_artifact(&old_skin, "g:skin");

        let project = WarProject {
            group_id: "g".to_string(),
            artifact_id: "app".to_string(),
            version: "1.0".to_string(),
            final_name: None,
            properties: Default::default(),
            dependencies: vec![
                Dependency::new("g", "lib", "2.0", "jar"),
                kept.clone(),
                now_provided.clone().with_scope(Scope::Provided),
            ],
            war: WarConfig {
                use_cache: true,
                overlay_types: vec!["war".to_string()],
                ..WarConfig::default()
            },
            basedir: root.to_path_buf(),
        };
        let manager = OverlayManager::from_project(&project).unwrap();
        let mut context =
            PackagingContext::new(&project, &manager, CacheLoad::Stale(previous)).unwrap();

        let webapp = context.webapp_directory().to_path_buf();
        let unpacked = context.work_directory().join("g").join("skin-war");
        for path in [
            "WEB-INF/lib/lib-1.0.jar",
            "WEB-INF/lib/kept-1.0.jar",
            "WEB-INF/lib/api-1.0.jar",
            "css/skin.css",
        ] {
            let file = webapp_file(&webapp, path);
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(&file, path).unwrap();
        }
        std::fs::create_dir_all(&unpacked).unwrap();

        analyze_dependencies(&mut context).unwrap();

        assert!(!webapp.join("WEB-INF/lib/lib-1.0.jar").exists());
        assert!(webapp.join("WEB-INF/lib/kept-1.0.jar").exists());
        assert!(!webapp.join("WEB-INF/lib/api-1.0.jar").exists());
        assert!(!webapp.join("css/skin.css").exists());
        assert!(!unpacked.exists());

        let previous = context.previous_structure().unwrap();
        assert!(!previous.is_registered("css/skin.css"));
        assert!(previous.is_registered("WEB-INF/lib/kept-1.0.jar"));
    }

    #[test]
    fn test_without_previous_build() {
        let project = WarProject {
            group_id: "g".to_string(),
            artifact_id: "app".to_string(),
            version: "1.0".to_string(),
            final_name: None,
            properties: Default::default(),
            dependencies: Vec::new(),
            war: WarConfig::default(),
            basedir: "/project".into(),
        };
        let manager = OverlayManager::from_project(&project).unwrap();
        let mut context = PackagingContext::new(&project, &manager, CacheLoad::Missing).unwrap();
        assert!(analyze_dependencies(&mut context).is_ok());
    }
}
