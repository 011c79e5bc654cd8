use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    explode_project, list_overlays, package_project, ExplodeProjectArgs, ListOverlaysArgs,
    PackageProjectArgs,
};
use miette::Result;
use tracing_subscriber::EnvFilter;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Show debug logs of the packaging engine
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble the exploded webapp directory
    Explode {
        /// The path to the war config file
        #[arg(short, long)]
        config_path: Option<String>,
    },
    /// Assemble the webapp and package it as a .war archive
    Package {
        /// The path to the war config file
        #[arg(short, long)]
        config_path: Option<String>,

        /// The directory to write the archive to
        #[arg(short, long)]
        output_dir: Option<String>,
    },
    /// Show the resolved overlay order
    Overlays {
        /// The path to the war config file
        #[arg(short, long)]
        config_path: Option<String>,

        /// Print the overlays as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "war_overlay=debug,war_pack=debug"
    } else {
        "war_overlay=warn,war_pack=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = parse_args();
    init_logging(args.verbose);

    match args.command {
        Commands::Explode { config_path } => explode_project(ExplodeProjectArgs { config_path }),
        Commands::Package {
            config_path,
            output_dir,
        } => package_project(PackageProjectArgs {
            config_path,
            output_dir,
        }),
        Commands::Overlays { config_path, json } => {
            list_overlays(ListOverlaysArgs { config_path, json })
        }
    }
}
