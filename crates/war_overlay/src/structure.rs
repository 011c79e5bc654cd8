//! Webapp structure tracking and persistence.
//!
//! The [`WebappStructure`] records which overlay owns every path of the
//! assembled webapp. Ownership is decided by the order of registration: the
//! first owner to register a path keeps it, except for overriding registrations
//! made on behalf of the current project.
//!
//! After a successful build the structure is saved next to the overlay work
//! directory. The saved record is keyed by a fingerprint of the dependency set
//! (see [`dependency_fingerprint`]); a record made against another dependency
//! set is [`CacheLoad::Stale`] and never used for registration decisions.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "version": 1,
//!   "fingerprint": 1234567890,
//!   "dependencies": [
//!     { "dependency": { "group_id": "g", "artifact_id": "a", "version": "1", "type": "jar" },
//!       "targetFileName": "a-1.jar" }
//!   ],
//!   "registeredFiles": { "currentBuild": ["index.jsp"] }
//! }
//! ```

use crate::error::Result;
use crate::utils::dependency_fingerprint;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use war_project::{Dependency, Scope};

/// Current schema version of the persisted structure.
pub const STRUCTURE_VERSION: u32 = 1;

/// A dependency of the run, with what the packaging did with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRecord {
    pub dependency: Dependency,

    /// File name the artifact was copied under (e.g. in `WEB-INF/lib`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_file_name: Option<String>,

    /// Overlay id the artifact was applied as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_id: Option<String>,
}

/// Outcome of [`WebappStructure::register_with_cache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The path is new; copy it.
    Registered,
    /// The path had the same owner in the previous run; copy it if modified.
    AlreadyRegistered,
    /// Another owner already claimed the path in this run.
    Refused { owner: String },
    /// The path belonged to another owner, still present, in the previous run.
    Superseded { previous: String },
    /// The path belonged to an owner that no longer exists.
    SupersededUnknownOwner { previous: String },
}

impl RegistrationOutcome {
    /// Whether the path now belongs to the registering owner.
    pub fn is_registered(&self) -> bool {
        !matches!(self, RegistrationOutcome::Refused { .. })
    }
}

/// Difference of one dependency between the previous and the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyChange {
    Unchanged(Dependency),
    New(Dependency),
    Removed(Dependency),
    UpdatedVersion {
        dependency: Dependency,
        previous_version: String,
    },
    UpdatedScope {
        dependency: Dependency,
        previous_scope: Scope,
    },
    UpdatedOptional {
        dependency: Dependency,
        previous_optional: bool,
    },
    UpdatedUnknown {
        dependency: Dependency,
        previous: Dependency,
    },
}

impl DependencyChange {
    /// The dependency the change is about (the previous one for removals).
    pub fn dependency(&self) -> &Dependency {
        match self {
            DependencyChange::Unchanged(d)
            | DependencyChange::New(d)
            | DependencyChange::Removed(d) => d,
            DependencyChange::UpdatedVersion { dependency, .. }
            | DependencyChange::UpdatedScope { dependency, .. }
            | DependencyChange::UpdatedOptional { dependency, .. }
            | DependencyChange::UpdatedUnknown { dependency, .. } => dependency,
        }
    }
}

/// Result of loading a saved structure.
#[derive(Debug)]
pub enum CacheLoad {
    /// No record exists (or it could not be read).
    Missing,
    /// The record was made against the current dependency set.
    Fresh(WebappStructure),
    /// The record was made against a different dependency set.
    Stale(WebappStructure),
}

/// Path ownership of an assembled webapp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebappStructure {
    version: u32,

    fingerprint: u64,

    dependencies: Vec<DependencyRecord>,

    /// Owner id -> paths owned.
    registered_files: BTreeMap<String, BTreeSet<String>>,

    /// Path -> owner id, rebuilt after loading.
    #[serde(skip)]
    all_files: HashMap<String, String>,

    /// Structure of the previous run, consulted by `register_with_cache`.
    #[serde(skip)]
    cache: Option<Box<WebappStructure>>,
}

impl WebappStructure {
    /// An empty structure for `dependencies`.
    pub fn new(dependencies: &[Dependency]) -> Self {
        Self {
            version: STRUCTURE_VERSION,
            fingerprint: dependency_fingerprint(dependencies),
            dependencies: dependencies
                .iter()
                .map(|dependency| DependencyRecord {
                    dependency: dependency.clone(),
                    target_file_name: None,
                    overlay_id: None,
                })
                .collect(),
            registered_files: BTreeMap::new(),
            all_files: HashMap::new(),
            cache: None,
        }
    }

    /// An empty structure that compares registrations against a previous run.
    pub fn with_cache(dependencies: &[Dependency], cache: WebappStructure) -> Self {
        let mut structure = Self::new(dependencies);
        structure.cache = Some(Box::new(cache));
        structure
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn dependencies(&self) -> &[DependencyRecord] {
        &self.dependencies
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub fn is_registered(&self, path: &str) -> bool {
        self.all_files.contains_key(path)
    }

    pub fn get_owner(&self, path: &str) -> Option<&str> {
        self.all_files.get(path).map(String::as_str)
    }

    /// Register `path` for `owner` if nobody owns it yet.
    ///
    /// Returns `false` if the path is already registered, by anyone.
    pub fn register_path(&mut self, owner: &str, path: &str) -> bool {
        if self.is_registered(path) {
            return false;
        }
        self.insert(owner, path);
        true
    }

    /// Register `path` for `owner`, taking it over from any other owner.
    ///
    /// Returns `false` only if `owner` already holds the path, so the first
    /// claim still wins within the same owner.
    pub fn register_path_overriding(&mut self, owner: &str, path: &str) -> bool {
        match self.all_files.get(path) {
            Some(current) if current == owner => false,
            Some(current) => {
                let current = current.clone();
                if let Some(paths) = self.registered_files.get_mut(&current) {
                    paths.remove(path);
                }
                tracing::debug!("{} taken over from '{}' by '{}'", path, current, owner);
                self.insert(owner, path);
                true
            }
            None => {
                self.insert(owner, path);
                true
            }
        }
    }

    /// Register `path` for `owner` and classify it against the previous run.
    pub fn register_with_cache(&mut self, owner: &str, path: &str) -> RegistrationOutcome {
        if let Some(current) = self.get_owner(path) {
            return RegistrationOutcome::Refused {
                owner: current.to_string(),
            };
        }
        self.insert(owner, path);

        let previous = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get_owner(path))
            .map(str::to_string);
        match previous {
            None => RegistrationOutcome::Registered,
            Some(previous) if previous == owner => RegistrationOutcome::AlreadyRegistered,
            Some(previous) if self.registered_files.contains_key(&previous) => {
                RegistrationOutcome::Superseded { previous }
            }
            Some(previous) => RegistrationOutcome::SupersededUnknownOwner { previous },
        }
    }

    /// Paths owned by `owner`, creating the (empty) bucket if needed.
    pub fn get_structure(&mut self, owner: &str) -> &BTreeSet<String> {
        self.registered_files.entry(owner.to_string()).or_default()
    }

    /// Paths owned by `owner`, without creating a bucket.
    pub fn structure(&self, owner: &str) -> Option<&BTreeSet<String>> {
        self.registered_files.get(owner)
    }

    /// Known owner ids, including those that registered nothing yet.
    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.registered_files.keys().map(String::as_str)
    }

    /// Every registered path with its owner, sorted by path.
    pub fn full_structure(&self) -> BTreeMap<&str, &str> {
        self.all_files
            .iter()
            .map(|(path, owner)| (path.as_str(), owner.as_str()))
            .collect()
    }

    /// Drop all registrations of `owner`, returning its paths.
    pub fn unregister_owner(&mut self, owner: &str) -> BTreeSet<String> {
        let paths = self.registered_files.remove(owner).unwrap_or_default();
        for path in &paths {
            self.all_files.remove(path);
        }
        paths
    }

    /// Drop the registration of a single path, returning its owner.
    pub fn unregister_path(&mut self, path: &str) -> Option<String> {
        let owner = self.all_files.remove(path)?;
        if let Some(paths) = self.registered_files.get_mut(&owner) {
            paths.remove(path);
        }
        Some(owner)
    }

    /// Record the file name `dependency` was copied under.
    pub fn register_target_file_name(&mut self, dependency: &Dependency, file_name: &str) {
        for record in self.records_mut(dependency) {
            record.target_file_name = Some(file_name.to_string());
        }
    }

    /// Record that `dependency` was applied as the overlay `overlay_id`.
    pub fn register_overlay_artifact(&mut self, dependency: &Dependency, overlay_id: &str) {
        for record in self.records_mut(dependency) {
            record.overlay_id = Some(overlay_id.to_string());
        }
    }

    /// The recorded entry for `dependency`, matched by artifact identity.
    pub fn dependency_record(&self, dependency: &Dependency) -> Option<&DependencyRecord> {
        self.dependencies
            .iter()
            .find(|record| record.dependency.same_artifact(dependency))
    }

    /// Compare the dependencies of this run against those of `previous`.
    ///
    /// Current dependencies are reported in order, followed by the removed
    /// ones in the order of the previous run.
    pub fn analyse_dependencies(&self, previous: &WebappStructure) -> Vec<DependencyChange> {
        let mut remaining = previous
            .dependencies
            .iter()
            .map(|record| &record.dependency)
            .collect::<Vec<_>>();
        let mut changes = Vec::with_capacity(self.dependencies.len());

        for record in &self.dependencies {
            let dependency = &record.dependency;

            if let Some(index) = remaining.iter().position(|d| identical(d, dependency)) {
                remaining.remove(index);
                changes.push(DependencyChange::Unchanged(dependency.clone()));
                continue;
            }

            let Some(index) = remaining.iter().position(|d| d.same_artifact(dependency)) else {
                changes.push(DependencyChange::New(dependency.clone()));
                continue;
            };
            let previous = remaining.remove(index);

            let change = if previous.version != dependency.version {
                DependencyChange::UpdatedVersion {
                    dependency: dependency.clone(),
                    previous_version: previous.version.clone(),
                }
            } else if previous.scope != dependency.scope {
                DependencyChange::UpdatedScope {
                    dependency: dependency.clone(),
                    previous_scope: previous.scope,
                }
            } else if previous.optional != dependency.optional {
                DependencyChange::UpdatedOptional {
                    dependency: dependency.clone(),
                    previous_optional: previous.optional,
                }
            } else {
                DependencyChange::UpdatedUnknown {
                    dependency: dependency.clone(),
                    previous: previous.clone(),
                }
            };
            changes.push(change);
        }

        changes.extend(
            remaining
                .into_iter()
                .map(|d| DependencyChange::Removed(d.clone())),
        );
        changes
    }

    /// Load a saved structure and check it against `dependencies`.
    ///
    /// A missing, unreadable or outdated record is reported as
    /// [`CacheLoad::Missing`]; an I/O error other than "not found" is returned.
    pub fn load(path: &Utf8Path, dependencies: &[Dependency]) -> Result<CacheLoad> {
        if !path.as_std_path().exists() {
            return Ok(CacheLoad::Missing);
        }

        let contents = std::fs::read_to_string(path.as_std_path())?;
        let mut structure: Self = match serde_json::from_str(&contents) {
            Ok(structure) => structure,
            Err(e) => {
                tracing::warn!("Ignoring unreadable webapp cache {}: {}", path, e);
                return Ok(CacheLoad::Missing);
            }
        };
        if structure.version != STRUCTURE_VERSION {
            tracing::debug!(
                "Ignoring webapp cache {} with version {}",
                path,
                structure.version
            );
            return Ok(CacheLoad::Missing);
        }
        structure.rebuild_index();

        if structure.fingerprint == dependency_fingerprint(dependencies) {
            Ok(CacheLoad::Fresh(structure))
        } else {
            tracing::debug!("Webapp cache {} was made for other dependencies", path);
            Ok(CacheLoad::Stale(structure))
        }
    }

    /// Save the structure as JSON. Creates parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_std_path(), contents)?;
        Ok(())
    }

    fn insert(&mut self, owner: &str, path: &str) {
        self.registered_files
            .entry(owner.to_string())
            .or_default()
            .insert(path.to_string());
        self.all_files.insert(path.to_string(), owner.to_string());
    }

    fn records_mut<'a>(
        &'a mut self,
        dependency: &'a Dependency,
    ) -> impl Iterator<Item = &'a mut DependencyRecord> + 'a {
        self.dependencies
            .iter_mut()
            .filter(move |record| record.dependency.same_artifact(dependency))
    }

    fn rebuild_index(&mut self) {
        self.all_files = self
            .registered_files
            .iter()
            .flat_map(|(owner, paths)| paths.iter().map(move |p| (p.clone(), owner.clone())))
            .collect();
    }
}

fn identical(a: &Dependency, b: &Dependency) -> bool {
    a.same_artifact(b) && a.version == b.version && a.scope == b.scope && a.optional == b.optional
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn deps() -> Vec<Dependency> {
        vec![
            Dependency::new("g", "skin", "1.0", "war"),
            Dependency::new("g", "lib", "2.0", "jar"),
        ]
    }

    #[test]
    fn test_first_registration_wins() {
        let mut structure = WebappStructure::new(&[]);
        assert!(structure.register_path("overlay1", "index.jsp"));
        assert!(!structure.register_path("overlay2", "index.jsp"));
        assert!(!structure.register_path("overlay1", "index.jsp"));
        assert_eq!(structure.get_owner("index.jsp"), Some("overlay1"));
    }

    #[test]
    fn test_overriding_registration() {
        let mut structure = WebappStructure::new(&[]);
        structure.register_path("overlay1", "index.jsp");

        assert!(structure.register_path_overriding("currentBuild", "index.jsp"));
        assert_eq!(structure.get_owner("index.jsp"), Some("currentBuild"));
        assert!(structure.structure("overlay1").unwrap().is_empty());

        // A second claim by the same owner is refused.
        assert!(!structure.register_path_overriding("currentBuild", "index.jsp"));
        assert!(structure.register_path_overriding("currentBuild", "login.jsp"));
    }

    #[test]
    fn test_get_structure_creates_bucket() {
        let mut structure = WebappStructure::new(&[]);
        assert!(structure.structure("a").is_none());
        assert!(structure.get_structure("a").is_empty());
        assert_eq!(structure.owners().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_register_with_cache_outcomes() {
        let mut previous = WebappStructure::new(&[]);
        previous.register_path("currentBuild", "same.jsp");
        previous.register_path("overlay1", "moved.jsp");
        previous.register_path("gone", "orphan.jsp");

        let mut structure = WebappStructure::with_cache(&[], previous);
        structure.get_structure("overlay1");

        assert_eq!(
            structure.register_with_cache("currentBuild", "new.jsp"),
            RegistrationOutcome::Registered
        );
        assert_eq!(
            structure.register_with_cache("currentBuild", "same.jsp"),
            RegistrationOutcome::AlreadyRegistered
        );
        assert_eq!(
            structure.register_with_cache("currentBuild", "moved.jsp"),
            RegistrationOutcome::Superseded {
                previous: "overlay1".to_string()
            }
        );
        assert_eq!(
            structure.register_with_cache("currentBuild", "orphan.jsp"),
            RegistrationOutcome::SupersededUnknownOwner {
                previous: "gone".to_string()
            }
        );
        let refused = structure.register_with_cache("overlay1", "new.jsp");
        assert_eq!(
            refused,
            RegistrationOutcome::Refused {
                owner: "currentBuild".to_string()
            }
        );
        assert!(!refused.is_registered());
    }

    #[test]
    fn test_unregister() {
        let mut structure = WebappStructure::new(&[]);
        structure.register_path("a", "x");
        structure.register_path("a", "y");
        structure.register_path("b", "z");

        assert_eq!(structure.unregister_path("z"), Some("b".to_string()));
        assert!(!structure.is_registered("z"));

        let removed = structure.unregister_owner("a");
        assert_eq!(removed.len(), 2);
        assert!(structure.full_structure().is_empty());
    }

    #[test]
    fn test_analyse_dependencies() {
        let previous = WebappStructure::new(&[
            Dependency::new("g", "same", "1", "jar"),
            Dependency::new("g", "bumped", "1", "jar"),
            Dependency::new("g", "scoped", "1", "jar"),
            Dependency::new("g", "opt", "1", "jar"),
            Dependency::new("g", "gone", "1", "jar"),
        ]);
        let current = WebappStructure::new(&[
            Dependency::new("g", "same", "1", "jar"),
            Dependency::new("g", "bumped", "2", "jar"),
            Dependency::new("g", "scoped", "1", "jar").with_scope(Scope::Provided),
            Dependency::new("g", "opt", "1", "jar").with_optional(true),
            Dependency::new("g", "fresh", "1", "jar"),
        ]);

        let changes = current.analyse_dependencies(&previous);
        assert_eq!(changes.len(), 6);
        assert!(matches!(changes[0], DependencyChange::Unchanged(_)));
        assert!(matches!(
            &changes[1],
            DependencyChange::UpdatedVersion { previous_version, .. } if previous_version == "1"
        ));
        assert!(matches!(
            changes[2],
            DependencyChange::UpdatedScope {
                previous_scope: Scope::Compile,
                ..
            }
        ));
        assert!(matches!(
            changes[3],
            DependencyChange::UpdatedOptional {
                previous_optional: false,
                ..
            }
        ));
        assert!(matches!(changes[4], DependencyChange::New(_)));
        assert!(
            matches!(&changes[5], DependencyChange::Removed(d) if d.artifact_id == "gone")
        );
    }

    #[test]
    fn test_target_file_name() {
        let deps = deps();
        let mut structure = WebappStructure::new(&deps);
        structure.register_target_file_name(&deps[1], "lib-2.0.jar");
        structure.register_overlay_artifact(&deps[0], "g:skin");

        let lib = structure.dependency_record(&deps[1]).unwrap();
        assert_eq!(lib.target_file_name.as_deref(), Some("lib-2.0.jar"));
        let skin = structure.dependency_record(&deps[0]).unwrap();
        assert_eq!(skin.overlay_id.as_deref(), Some("g:skin"));
    }

    #[test]
    fn test_save_and_load_fresh() {
        let temp = NamedTempFile::new().unwrap();
        let path = Utf8Path::from_path(temp.path()).unwrap();

        let deps = deps();
        let mut structure = WebappStructure::new(&deps);
        structure.register_path("currentBuild", "index.jsp");
        structure.register_path("g:skin", "css/site.css");
        structure.save(path).unwrap();

        let CacheLoad::Fresh(loaded) = WebappStructure::load(path, &deps).unwrap() else {
            panic!("expected a fresh cache");
        };
        assert_eq!(loaded.get_owner("css/site.css"), Some("g:skin"));
        assert_eq!(loaded.get_owner("index.jsp"), Some("currentBuild"));
        assert_eq!(loaded.fingerprint(), structure.fingerprint());
    }

    #[test]
    fn test_load_stale() {
        let temp = NamedTempFile::new().unwrap();
        let path = Utf8Path::from_path(temp.path()).unwrap();

        let mut structure = WebappStructure::new(&deps());
        structure.register_path("currentBuild", "index.jsp");
        structure.save(path).unwrap();

        let other = vec![Dependency::new("g", "skin", "1.1", "war")];
        let load = WebappStructure::load(path, &other).unwrap();
        assert!(matches!(load, CacheLoad::Stale(_)));
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("cache.json");
        assert!(matches!(
            WebappStructure::load(&path, &[]).unwrap(),
            CacheLoad::Missing
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            WebappStructure::load(&path, &[]).unwrap(),
            CacheLoad::Missing
        ));
    }
}
