use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod ui;

use commands::{clean::CleanCommand, export::ExportCommand, scan::ScanCommand};
use ui::info;

/// SceneForge CLI - scene cleanup and portable export for game map content
#[derive(Parser)]
#[command(
    name = "sceneforge",
    version = env!("CARGO_PKG_VERSION"),
    about = "Normalize imported map scenes and package selections into portable archives",
    long_about = None,
    arg_required_else_help = true
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find placement files and the model repository under a root directory
    Scan(ScanCommand),

    /// Run the cleanup pass over a scene document
    Clean(CleanCommand),

    /// Package selected nodes into a zip archive
    Export(ExportCommand),

    /// Show version and build information
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    colored::control::set_override(!cli.no_color);
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Scan(cmd) => cmd.execute(),
        Commands::Clean(cmd) => cmd.execute(),
        Commands::Export(cmd) => cmd.execute(),
        Commands::Info => {
            show_info();
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(format!(
            "sceneforge_core={level},sceneforge_cli={level}"
        ))
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

fn show_info() {
    info(&format!("SceneForge v{}", env!("CARGO_PKG_VERSION")));
    ui::print_table(
        "",
        &[
            (
                "core".to_string(),
                sceneforge_core::VERSION.to_string(),
            ),
            (
                "geometry formats".to_string(),
                "gltf (built-in), dff (external codec)".to_string(),
            ),
        ],
    );
}
