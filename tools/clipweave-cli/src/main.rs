//! Clipweave CLI: plan and compose timelines.
//!
//! Usage:
//!   clipweave compose <MANIFEST>   Render the video and audio tracks
//!   clipweave plan <MANIFEST>      Show the normalized visual covering
//!   clipweave check                Check that ffmpeg can be run
//!   clipweave init <DIR>           Write an example timeline manifest

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use clipweave_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "clipweave",
    about = "Compose sparse media timelines into finished video and audio tracks",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a timeline manifest into a video and an audio file
    Compose {
        /// Path to the timeline manifest (JSON)
        manifest: PathBuf,

        /// Video output path (default: video.mp4 next to the manifest)
        #[arg(long)]
        video_out: Option<PathBuf>,

        /// Audio output path (default: audio.mp3 next to the manifest)
        #[arg(long)]
        audio_out: Option<PathBuf>,

        /// Leave uncovered ranges out instead of filling them
        #[arg(long)]
        exclude_empty: bool,

        /// Output frame rate (default: the manifest's)
        #[arg(long)]
        framerate: Option<u32>,

        /// Print the ffmpeg requests instead of running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how a timeline's visual segments are laid out
    Plan {
        /// Path to the timeline manifest (JSON)
        manifest: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the configured ffmpeg binary runs
    Check,

    /// Write an example timeline manifest
    Init {
        /// Directory to create the manifest in
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    clipweave_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Compose {
            manifest,
            video_out,
            audio_out,
            exclude_empty,
            framerate,
            dry_run,
        } => {
            commands::compose::run(
                &config,
                commands::compose::ComposeArgs {
                    manifest,
                    video_out,
                    audio_out,
                    exclude_empty,
                    framerate,
                    dry_run,
                },
            )
            .await
        }
        Commands::Plan { manifest, json } => commands::plan::run(manifest, json),
        Commands::Check => commands::check::run(&config).await,
        Commands::Init { path } => commands::init::run(path),
    }
}
