//! `slidecast` CLI - serve, plan and render narrated slideshows

mod cmd;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slidecast")]
#[command(about = "Crossfade slideshows with narration and burned-in subtitles")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/slidecast/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP rendering service
    Serve {
        /// Listen address (overrides config)
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Parent directory for request workspaces (overrides config)
        #[arg(long)]
        scratch_root: Option<PathBuf>,
    },

    /// Print the crossfade schedule and filter graph without running ffmpeg
    Plan {
        /// Number of images
        images: usize,

        /// Narration length in seconds
        duration: f64,

        /// Crossfade length in seconds
        #[arg(short, long, default_value = "1.0")]
        transition: f64,

        /// Print the schedule as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a video locally from remote assets
    Render {
        /// Image URL (repeat for each slide, in order)
        #[arg(short, long = "image", required = true)]
        images: Vec<String>,

        /// Narration URL
        #[arg(short, long)]
        audio: String,

        /// ASS subtitle file
        #[arg(short, long)]
        subtitles: PathBuf,

        /// Output file
        #[arg(short, long, default_value = "final_video.mp4")]
        output: PathBuf,

        /// Parent directory for the workspace (overrides config)
        #[arg(long)]
        scratch_root: Option<PathBuf>,
    },

    /// Check that ffmpeg and ffprobe are available
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG overrides the default level)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Serve { bind, scratch_root } => {
            cmd::serve::cmd_serve(config, bind, scratch_root).await?;
        }
        Commands::Plan {
            images,
            duration,
            transition,
            json,
        } => {
            cmd::plan::cmd_plan(images, duration, transition, json)?;
        }
        Commands::Render {
            images,
            audio,
            subtitles,
            output,
            scratch_root,
        } => {
            cmd::render::cmd_render(config, images, audio, &subtitles, &output, scratch_root).await?;
        }
        Commands::Check => {
            cmd::check::cmd_check(config).await?;
        }
    }

    Ok(())
}
