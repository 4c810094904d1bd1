//! rtkbridge-cli - Command-line tools for rtkbridge
//!
//! Offline checks on RTCM captures, NTRIP credential helpers, and a live
//! caster probe.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rtkbridge-cli")]
#[command(about = "Command-line tools for the rtkbridge RTCM/NTRIP forwarder")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "RTKBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Decode a raw capture and summarize its RTCM messages
    Check {
        /// Capture file
        file: PathBuf,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the NTRIP 2.0 Authorization header for a username and password
    AuthHeader {
        username: String,
        password: String,
    },

    /// Build a framed RTCM3 message from a hex payload
    Frame {
        /// Payload bytes as hex (may be empty)
        #[arg(default_value = "")]
        payload: String,
    },

    /// Show the handshake request for a configured caster
    Request {
        /// Caster slot (1 or 2)
        #[arg(short, long, default_value_t = 1)]
        caster: u8,

        /// Print the password instead of masking it
        #[arg(long)]
        reveal: bool,
    },

    /// Connect to a configured caster, verify the handshake, and disconnect
    Probe {
        /// Caster slot (1 or 2)
        #[arg(short, long, default_value_t = 1)]
        caster: u8,
    },

    /// Validate the configuration and print the effective settings
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match commands::execute(cli.command, cli.config.as_deref()).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
