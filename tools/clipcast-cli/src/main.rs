//! Clipcast CLI: inspect layouts, compose stills, and run the recording
//! and export pipeline end to end against synthetic devices.
//!
//! Usage:
//!   clipcast layouts            List export layouts
//!   clipcast backgrounds        List built-in backgrounds
//!   clipcast compose [OPTIONS]  Render one composite frame to PNG
//!   clipcast simulate [OPTIONS] Record from synthetic devices and export
//!   clipcast config             Print the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clipcast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "clipcast",
    about = "Screen and camera recording with composited export",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List export layouts
    Layouts {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List built-in backgrounds
    Backgrounds {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a single composite frame from still images
    Compose {
        /// Screen image
        #[arg(long)]
        screen: Option<PathBuf>,

        /// Camera image
        #[arg(long)]
        camera: Option<PathBuf>,

        /// Layout id (see `clipcast layouts`)
        #[arg(short, long)]
        layout: Option<String>,

        /// Background id, or a path to an image file
        #[arg(short, long)]
        background: Option<String>,

        /// Output width (defaults to the configured export width)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (defaults to the configured export height)
        #[arg(long)]
        height: Option<u32>,

        /// Output PNG path
        #[arg(short, long, default_value = "composite.png")]
        output: PathBuf,
    },

    /// Record from synthetic devices, then export the recording
    Simulate {
        /// Recording mode: screen-and-camera | screen-only | camera-only
        #[arg(short, long, default_value = "screen-and-camera")]
        mode: String,

        /// Seconds to record before stopping
        #[arg(long, default_value = "3")]
        secs: u64,

        /// Layout id (see `clipcast layouts`)
        #[arg(short, long)]
        layout: Option<String>,

        /// Background id, or a path to an image file
        #[arg(short, long)]
        background: Option<String>,

        /// Export width
        #[arg(long, default_value = "640")]
        width: u32,

        /// Export height
        #[arg(long, default_value = "360")]
        height: u32,

        /// Export frame rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Output file (defaults to the configured output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Print only the config file location
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    clipcast_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Layouts { json } => commands::layouts::run(json),
        Commands::Backgrounds { json } => commands::backgrounds::run(json),
        Commands::Compose {
            screen,
            camera,
            layout,
            background,
            width,
            height,
            output,
        } => commands::compose::run(
            &config,
            commands::compose::ComposeArgs {
                screen,
                camera,
                layout,
                background,
                width,
                height,
                output,
            },
        ),
        Commands::Simulate {
            mode,
            secs,
            layout,
            background,
            width,
            height,
            fps,
            output,
        } => {
            commands::simulate::run(
                &config,
                commands::simulate::SimulateArgs {
                    mode,
                    secs,
                    layout,
                    background,
                    width,
                    height,
                    fps,
                    output,
                },
            )
            .await
        }
        Commands::Config { path } => commands::config::run(&config, cli.config, path),
    }
}
