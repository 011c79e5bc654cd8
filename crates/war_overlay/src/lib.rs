//! Overlay-merging webapp assembler and WAR packager.
//!
//! This crate assembles the exploded directory of a web application from the
//! current project and any number of *overlays*, archives of other web
//! applications whose content is merged in. It supports:
//!
//! - **Ordered overlays**: explicit overlays in configured order, the current
//!   project at a configurable position, implicit overlays for every remaining
//!   overlay-type dependency
//! - **Ownership tracking**: every output path is owned by exactly one overlay;
//!   among overlays the first writer wins, the current project always wins
//! - **Incremental rebuilds**: the [`WebappStructure`] is persisted between
//!   builds and files of removed or updated dependencies are cleaned up
//! - **Resource filtering**: `${...}` and `@...@` token substitution over
//!   project properties and filter files
//! - **Archiving**: the assembled directory is zipped into a `.war` file
//!
//! # Example
//!
//! ```no_run
//! use war_overlay::WarBuilder;
//! use war_project::WarProject;
//! use camino::Utf8Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WarProject::find_config(Utf8Path::new("."))?;
//! let project = WarProject::load(&config)?;
//!
//! let result = WarBuilder::new(&project)
//!     .with_progress(|progress| {
//!         println!("Stage: {:?}, Progress: {}/{}",
//!             progress.stage, progress.current, progress.total);
//!     })
//!     .package()?;
//! println!("Built {} from {} overlays",
//!     result.archive.path, result.exploded.overlays.len());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod builder;
pub mod context;
pub mod error;
pub mod filter;
pub mod overlay;
pub mod overlay_manager;
pub mod scanner;
pub mod structure;
pub mod tasks;
pub mod utils;

// Re-export main types
pub use archive::{create_war, ArchiveOptions, ArchiveSummary, MANIFEST_PATH, WEB_XML_PATH};
pub use builder::{ExplodeResult, PackageResult, PackagingProgress, PackagingStage, WarBuilder};
pub use context::PackagingContext;
pub use error::{Error, Result};
pub use overlay::{Overlay, CURRENT_BUILD_ID};
pub use overlay_manager::OverlayManager;
pub use structure::{CacheLoad, DependencyChange, DependencyRecord, RegistrationOutcome, WebappStructure};
pub use tasks::{PackagingTask, PostPackagingTask};
