use super::{load_project, print_progress};
use crate::errors::CliError;
use colored::Colorize;
use miette::Result;
use war_overlay::WarBuilder;

#[derive(Debug)]
pub struct ExplodeProjectArgs {
    pub config_path: Option<String>,
}

pub fn explode_project(args: ExplodeProjectArgs) -> Result<()> {
    let project = load_project(args.config_path)?;

    println!(
        "{} {}",
        "🧩 Assembling webapp:".bright_blue().bold(),
        project.final_name().bright_cyan().bold()
    );

    let result = WarBuilder::new(&project)
        .with_progress(print_progress)
        .explode()
        .map_err(CliError::from)?;

    println!(
        "{}\n{} {}\n{} {} files from {} overlays in {:.2?}",
        "✅ Webapp assembled successfully!".bright_green().bold(),
        "📍 Path:".bright_green(),
        result.webapp_directory.as_str().bright_white().bold(),
        "📊".bright_green(),
        result.files,
        result.overlays.len(),
        result.build_time
    );

    Ok(())
}
