//! CLI module for the lecture relay.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Lecture Relay - lecture video analysis over Gemini
///
/// Streams an AI analysis of a lecture video, using YouTube captions when they exist and
/// the video's audio otherwise.
#[derive(Parser, Debug)]
#[command(name = "lecture-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "LECTURE_RELAY_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to the configured port or PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Analyze one lecture from the command line
    Analyze {
        /// YouTube URL/ID, or a local audio/video file path
        input: String,

        /// Analysis prompt
        #[arg(short, long, required_unless_present = "prompt_file")]
        prompt: Option<String>,

        /// Read the analysis prompt from a file
        #[arg(long, conflicts_with = "prompt")]
        prompt_file: Option<String>,

        /// Write the analysis to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
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
    /// Show current configuration (secrets redacted)
    Show,

    /// Show configuration file path
    Path,
}
