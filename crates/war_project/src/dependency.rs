use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dependency scope, as resolved by the host build.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    #[default]
    Compile,
    Provided,
    Runtime,
    Test,
    System,
}

impl Scope {
    /// Whether artifacts of this scope end up in the assembled webapp.
    pub fn is_bundled(self) -> bool {
        matches!(self, Scope::Compile | Scope::Runtime)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Provided => "provided",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::System => "system",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_kind() -> String {
    "jar".to_string()
}

/// A resolved dependency artifact of the project.
///
/// The host build has already resolved these: `file` points at the local copy
/// of the artifact. Order in the project file is the dependency resolution
/// order and is preserved everywhere it matters (implicit overlays, library
/// copying).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,

    /// Packaging type (`war`, `jar`, `zip`, `tld`, ...). Defaults to `jar`.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,

    #[serde(default)]
    pub scope: Scope,

    #[serde(default)]
    pub optional: bool,

    /// Local file of the resolved artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Utf8PathBuf>,
}

impl Dependency {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            kind: kind.into(),
            classifier: None,
            scope: Scope::Compile,
            optional: false,
            file: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_file(mut self, file: impl Into<Utf8PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Classifier with blank values treated as absent.
    pub fn classifier(&self) -> Option<&str> {
        self.classifier
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Returns true if both refer to the same artifact, ignoring version,
    /// scope and the optional flag.
    pub fn same_artifact(&self, other: &Dependency) -> bool {
        self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.kind == other.kind
            && self.classifier() == other.classifier()
    }

    /// Whether this dependency is copied into the webapp at all.
    pub fn is_bundled(&self) -> bool {
        self.scope.is_bundled() && !self.optional
    }

    /// File extension of the artifact for its packaging type.
    pub fn extension(&self) -> &str {
        match self.kind.as_str() {
            "ejb" | "ejb-client" | "test-jar" | "java-source" | "javadoc" => "jar",
            other => other,
        }
    }

    /// Standard repository file name: `artifactId-version[-classifier].extension`.
    pub fn default_file_name(&self) -> String {
        match self.classifier() {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact_id,
                self.version,
                classifier,
                self.extension()
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension()),
        }
    }

    /// `groupId:artifactId:type[:classifier]`, the version-less identity.
    pub fn management_key(&self) -> String {
        match self.classifier() {
            Some(classifier) => format!(
                "{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.kind, classifier
            ),
            None => format!("{}:{}:{}", self.group_id, self.artifact_id, self.kind),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.management_key(), self.version)?;
        if self.scope != Scope::Compile {
            write!(f, ":{}", self.scope)?;
        }
        if self.optional {
            f.write_str(" (optional)")?;
        }
        Ok(())
    }
}
