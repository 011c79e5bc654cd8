mod explode;
mod overlays;
mod package;

pub use explode::{explode_project, ExplodeProjectArgs};
pub use overlays::{list_overlays, ListOverlaysArgs};
pub use package::{package_project, PackageProjectArgs};

use crate::errors::CliError;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use war_overlay::{PackagingProgress, PackagingStage};
use war_project::WarProject;

/// Load the project from `config_path`, or from the config file in the
/// current directory.
pub(crate) fn load_project(config_path: Option<String>) -> Result<WarProject> {
    let config_path = match config_path {
        Some(path) => Utf8PathBuf::from(path),
        None => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            let cwd = Utf8PathBuf::from_path_buf(cwd)
                .map_err(|path| CliError::non_utf8_path(path.to_string_lossy()))?;
            WarProject::find_config(&cwd).map_err(CliError::from)?
        }
    };

    tracing::debug!("Loading project from {}", config_path);
    Ok(WarProject::load(&config_path).map_err(CliError::from)?)
}

/// Print packaging progress as the tasks run.
pub(crate) fn print_progress(progress: PackagingProgress) {
    match progress.stage {
        PackagingStage::Unpacking if progress.current == 0 => println!(
            "{} {}",
            "📂 Unpacking overlays:".bright_yellow(),
            progress.total.to_string().bright_white().bold()
        ),
        PackagingStage::Packaging => {
            if let Some(task) = progress.current_task {
                println!(
                    "   {} {} {}",
                    "•".bright_cyan(),
                    format!("[{}/{}]", progress.current, progress.total).dimmed(),
                    task.bright_white()
                );
            }
        }
        PackagingStage::SavingStructure => {
            println!("   {} {}", "•".bright_cyan(), "saving webapp structure".dimmed())
        }
        PackagingStage::Archiving => println!("{}", "🗜️  Writing archive...".bright_yellow()),
        _ => {}
    }
}
