use super::load_project;
use crate::errors::CliError;
use crate::println_pad;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use serde_json::json;
use war_overlay::{Overlay, OverlayManager};

#[derive(Debug)]
pub struct ListOverlaysArgs {
    pub config_path: Option<String>,
    pub json: bool,
}

pub fn list_overlays(args: ListOverlaysArgs) -> Result<()> {
    let project = load_project(args.config_path)?;
    let manager = OverlayManager::from_project(&project).map_err(CliError::from)?;

    if args.json {
        let overlays = manager.overlays().iter().map(overlay_json).collect::<Vec<_>>();
        let pretty = serde_json::to_string_pretty(&overlays).into_diagnostic()?;
        println!("{}", pretty);
        return Ok(());
    }

    println!(
        "{} {}",
        "🧩 Overlays of".bright_blue().bold(),
        project.final_name().bright_cyan().bold()
    );
    for (idx, overlay) in manager.overlays().iter().enumerate() {
        let mut flags = Vec::new();
        if overlay.is_current_project() {
            flags.push("current project".to_string());
        }
        if overlay.implicit {
            flags.push("implicit".to_string());
        }
        if overlay.skip {
            flags.push("skipped".to_string());
        }
        if overlay.filtered {
            flags.push("filtered".to_string());
        }
        if let Some(target_path) = &overlay.target_path {
            flags.push(format!("-> {}", target_path));
        }

        println_pad!(
            "{} {} {}",
            format!("{}.", idx + 1).dimmed(),
            overlay.id.bright_cyan().bold(),
            if flags.is_empty() {
                String::new()
            } else {
                format!("({})", flags.join(", ")).dimmed().to_string()
            }
        );
        if let Some(file) = overlay.artifact.as_ref().and_then(|a| a.file.as_ref()) {
            println_pad!("   {}", file.as_str().bright_white());
        }
    }

    Ok(())
}

fn overlay_json(overlay: &Overlay) -> serde_json::Value {
    json!({
        "id": overlay.id,
        "groupId": overlay.group_id,
        "artifactId": overlay.artifact_id,
        "classifier": overlay.classifier,
        "type": overlay.kind,
        "includes": overlay.includes,
        "excludes": overlay.excludes,
        "filtered": overlay.filtered,
        "skip": overlay.skip,
        "targetPath": overlay.target_path,
        "implicit": overlay.implicit,
        "file": overlay.artifact.as_ref().and_then(|a| a.file.as_ref()).map(|f| f.as_str()),
    })
}
