//! CLI module for clipbot.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{format_bytes, format_duration, Output};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// clipbot - split videos into clips from a chat
///
/// Runs a Telegram bot that cuts uploaded videos into fixed-length clips
/// with ffmpeg, and offers the same splitting locally from the command line.
#[derive(Parser, Debug)]
#[command(name = "clipbot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bot, long-polling the Bot API for updates
    Run,

    /// Run the bot behind an HTTP webhook
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Split a local video into clips
    Split {
        /// Video file to split
        input: PathBuf,

        /// Length of each clip in seconds
        #[arg(short, long)]
        duration: String,

        /// Directory for the clips (defaults to processing.clips_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show video metadata and how many clips a split would produce
    Probe {
        /// Video file to inspect
        input: PathBuf,

        /// Clip length used for the estimate
        #[arg(short, long)]
        duration: Option<String>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Open configuration file in editor
    Edit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_split() {
        let cli = Cli::try_parse_from(["clipbot", "-vv", "split", "in.mp4", "-d", "60"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Split {
                input,
                duration,
                output,
            } => {
                assert_eq!(input, PathBuf::from("in.mp4"));
                assert_eq!(duration, "60");
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
