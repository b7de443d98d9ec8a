use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "upscaler")]
#[command(author, version, about = "Upload images and upscale them with Real-ESRGAN")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server with the upload page
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Upscale a single image file through the configured backend
    Upscale {
        /// Image to upscale
        #[arg(required = true)]
        input: PathBuf,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the configured backend is usable
    CheckBackend,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config or defaults if not specified)
        file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
