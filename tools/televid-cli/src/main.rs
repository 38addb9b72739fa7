//! televid CLI — burn timed captions into videos.
//!
//! Usage:
//!   televid render <INPUT> -c <CUES> -o <OUTPUT>   Render one captioned video
//!   televid batch <MANIFEST>                        Render a manifest of jobs
//!   televid validate <CUES>                         Parse and lay out cues without rendering
//!   televid probe <INPUT>                           Show what ffprobe reports for a video
//!   televid check                                   Check engine, fonts, and work directory
//!   televid init                                    Write a default configuration file

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use televid_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "televid",
    about = "Burn styled captions into video files with ffmpeg",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/televid/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Burn captions into a single video
    Render(commands::render::RenderArgs),

    /// Render every job in a JSON manifest concurrently
    Batch(commands::batch::BatchArgs),

    /// Parse cues and build the compositor spec without running the engine
    Validate(commands::validate::ValidateArgs),

    /// Show video properties as seen by ffprobe
    Probe {
        /// Path to the video
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Check engine programs, fonts, and the work directory
    Check,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Also write the built-in style sheet to this path
        #[arg(long)]
        styles: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match (&cli.command, &cli.config) {
        // init writes the file --config names, so it must not require one.
        (Commands::Init { .. }, _) => AppConfig::default(),
        (_, Some(path)) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        (_, None) => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.json |= cli.log_json;
    televid_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Render(args) => commands::render::run(config, args).await,
        Commands::Batch(args) => commands::batch::run(config, args).await,
        Commands::Validate(args) => commands::validate::run(&config, args),
        Commands::Probe { input, json } => commands::probe::run(&config, input, json),
        Commands::Check => commands::check::run(&config),
        Commands::Init { force, styles } => commands::init::run(cli.config, force, styles),
    }
}
