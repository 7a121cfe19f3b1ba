//! Backdrop CLI - configuration and layout checker
//!
//! Features:
//! - Configuration validation
//! - Resolved YouTube player variables and Vimeo embed URLs
//! - Cover-fit layout computation for arbitrary container sizes

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use output::OutputFormat;

/// Backdrop CLI - background video widget toolkit
#[derive(Parser)]
#[command(name = "backdrop")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Check background video configurations and layouts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a widget configuration
    Check {
        /// Path to the JSON configuration
        config: PathBuf,
    },

    /// Show the parameters the backend player receives
    Embed {
        /// Path to the JSON configuration
        config: PathBuf,
    },

    /// Compute the player placement for a container
    Layout {
        /// Container width in pixels
        #[arg(long)]
        width: f64,

        /// Container height in pixels
        #[arg(long, default_value = "0")]
        height: f64,

        /// Video aspect ratio (width / height)
        #[arg(short, long, default_value_t = 16.0 / 9.0)]
        ratio: f64,

        /// Derive the container height from its width
        #[arg(long)]
        force_aspect: bool,

        /// Size the player to the container instead of covering it
        #[arg(long)]
        no_fit: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from(cli.format.as_str());

    match cli.command {
        Commands::Check { config } => {
            commands::check(&config, format)?;
        }
        Commands::Embed { config } => {
            commands::embed(&config, format)?;
        }
        Commands::Layout { width, height, ratio, force_aspect, no_fit } => {
            commands::layout(width, height, ratio, force_aspect, !no_fit, format)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_layout_flags() {
        let cli = Cli::parse_from([
            "backdrop", "--format", "json", "layout", "--width", "800", "--force-aspect",
        ]);
        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Layout { width, height, force_aspect, no_fit, .. } => {
                assert_eq!(width, 800.0);
                assert_eq!(height, 0.0);
                assert!(force_aspect);
                assert!(!no_fit);
            }
            _ => panic!("expected layout"),
        }
    }
}
