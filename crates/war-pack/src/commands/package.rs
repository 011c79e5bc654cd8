use super::{load_project, print_progress};
use crate::errors::CliError;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;
use war_overlay::WarBuilder;

#[derive(Debug)]
pub struct PackageProjectArgs {
    pub config_path: Option<String>,
    pub output_dir: Option<String>,
}

pub fn package_project(args: PackageProjectArgs) -> Result<()> {
    let mut project = load_project(args.config_path)?;
    if let Some(output_dir) = args.output_dir {
        project.war.output_directory = Some(project.resolve(&Utf8PathBuf::from(output_dir)));
    }

    println!(
        "{} {}",
        "📦 Packaging webapp:".bright_blue().bold(),
        project.final_name().bright_cyan().bold()
    );

    let result = WarBuilder::new(&project)
        .with_progress(print_progress)
        .package()
        .map_err(CliError::from)?;

    if !result.archive.has_web_xml {
        println!(
            "{}",
            "⚠️  The archive has no WEB-INF/web.xml".bright_yellow()
        );
    }
    println!(
        "{}\n{} {}\n{} {} entries, {} overlays, {:.2?}",
        "✅ Archive created successfully!".bright_green().bold(),
        "📍 Path:".bright_green(),
        result.archive.path.as_str().bright_white().bold(),
        "📊".bright_green(),
        result.archive.files,
        result.exploded.overlays.len(),
        result.exploded.build_time
    );

    Ok(())
}
