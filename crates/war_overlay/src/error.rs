//! Error types for webapp packaging.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. Variants fall in three groups: configuration problems
//! detected while resolving overlays (before anything is written), I/O and
//! archive failures (always fatal), and the missing `web.xml` check performed
//! when the archive is created.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling or packaging a webapp.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (copying resources, writing the webapp, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize the webapp structure cache.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing a zip based archive failed.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Walking a source directory failed.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// An include or exclude pattern could not be compiled.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Two overlays resolve to the same identifier.
    #[error("Duplicate overlay id '{0}'")]
    DuplicateOverlayId(String),

    /// An overlay with coordinates uses the id reserved for the current build.
    #[error("Overlay id '{0}' is reserved for the current build")]
    ReservedOverlayId(String),

    /// An overlay entry is malformed (e.g. only one of groupId/artifactId set).
    #[error("Invalid overlay '{id}': {reason}")]
    InvalidOverlay { id: String, reason: String },

    /// An explicit overlay does not match any dependency of the project.
    #[error("Overlay '{0}' is not a dependency of the project")]
    OverlayNotADependency(String),

    /// A dependency needed for packaging has no resolved file.
    #[error("Artifact file for '{artifact}' not found: {path}")]
    MissingArtifactFile { artifact: String, path: Utf8PathBuf },

    /// A web resource target path points outside the webapp directory.
    #[error("Target path '{0}' points outside the webapp directory")]
    InvalidTargetPath(String),

    /// A configured delimiter specification is empty or malformed.
    #[error("Invalid filtering delimiter '{0}'")]
    InvalidDelimiter(String),

    /// Filtering was requested with an encoding other than UTF-8.
    #[error("Unsupported resource encoding '{0}'")]
    UnsupportedEncoding(String),

    /// Extracting an overlay archive failed.
    #[error("Failed to unpack overlay '{overlay}': {source}")]
    Unpack {
        overlay: String,
        #[source]
        source: Box<Error>,
    },

    /// A packaging task failed. Wraps the underlying error with the task name.
    #[error("Packaging task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: Box<Error>,
    },

    /// The explicitly configured `web.xml` does not exist.
    #[error("The specified web.xml file '{0}' does not exist")]
    WebXmlNotFound(Utf8PathBuf),

    /// The assembled webapp has no `WEB-INF/web.xml` and that is not permitted.
    #[error("Webapp has no WEB-INF/web.xml (set fail_on_missing_web_xml = false to allow this)")]
    MissingWebXml,

    /// A path is not valid UTF-8.
    #[error("Non UTF-8 path: {0}")]
    NonUtf8Path(String),
}

impl Error {
    /// Whether the error is a configuration problem detected before any write.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::DuplicateOverlayId(_)
                | Error::ReservedOverlayId(_)
                | Error::InvalidOverlay { .. }
                | Error::OverlayNotADependency(_)
                | Error::InvalidTargetPath(_)
                | Error::MissingArtifactFile { .. }
                | Error::InvalidDelimiter(_)
                | Error::UnsupportedEncoding(_)
                | Error::Pattern(_)
        )
    }

    pub(crate) fn in_task(self, task: impl Into<String>) -> Self {
        Error::Task {
            task: task.into(),
            source: Box::new(self),
        }
    }
}
