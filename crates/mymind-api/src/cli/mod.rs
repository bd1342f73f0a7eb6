//! CLI command definitions for the `mymind` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod therapists;
pub mod user;
pub mod watch;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Therapy booking and session chat server.
#[derive(Parser)]
#[command(name = "mymind", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP and WebSocket server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Manage accounts and access tokens.
    User {
        #[command(subcommand)]
        action: user::UserCommand,
    },

    /// List therapists that are free to book.
    Therapists,

    /// Follow your live session's remaining time from the terminal.
    Watch {
        /// Base URL of a running server.
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,

        /// Participant token.
        #[arg(long, env = "MYMIND_TOKEN")]
        token: String,

        /// Poll interval in milliseconds (defaults to the configured value).
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
