//! NotiSync CLI
//!
//! Command-line client for a NotiSync notification server.
//!
//! # Commands
//!
//! - `watch` - Stay connected and print notifications as they arrive
//! - `list` - List notifications
//! - `unread` - Print the unread count
//! - `read` - Mark one notification as read
//! - `read-all` - Mark every notification as read

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::Context;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// One JSON document per result
    Json,
}

/// NotiSync notification client.
#[derive(Parser)]
#[command(name = "notisync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(global = true, long, env = "NOTISYNC_SERVER", default_value = "http://localhost:8000")]
    server: String,

    /// Bearer token
    #[arg(global = true, long, env = "NOTISYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value = "text")]
    format: Format,

    /// Request timeout in seconds
    #[arg(global = true, long, default_value = "30")]
    timeout: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stay connected and print notifications as they arrive
    Watch {
        /// Seconds between unread-count polls
        #[arg(long, default_value = "60")]
        poll_interval: u64,

        /// Reconnect attempts before falling back to polling only
        #[arg(long, default_value = "5")]
        max_reconnects: u32,
    },

    /// List notifications
    List {
        /// Only the most recent notifications
        #[arg(short, long)]
        recent: bool,

        /// Only unread notifications
        #[arg(short, long)]
        unread: bool,
    },

    /// Print the unread count
    Unread,

    /// Mark one notification as read
    Read {
        /// Notification id
        id: i64,
    },

    /// Mark every notification as read
    ReadAll,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let context = Context::new(
        &cli.server,
        cli.token,
        Duration::from_secs(cli.timeout),
        cli.format,
    )?;

    match cli.command {
        Commands::Watch {
            poll_interval,
            max_reconnects,
        } => {
            let poll_interval = Duration::from_secs(poll_interval);
            commands::watch::run(context, poll_interval, max_reconnects).await?;
        }
        Commands::List { recent, unread } => {
            commands::list::run(&context, recent, unread).await?;
        }
        Commands::Unread => {
            commands::unread::run(&context).await?;
        }
        Commands::Read { id } => {
            commands::read::run(&context, Some(id)).await?;
        }
        Commands::ReadAll => {
            commands::read::run(&context, None).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "notisync",
            "read",
            "42",
            "--token",
            "abc",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.token.as_deref(), Some("abc"));
        assert_eq!(cli.format, Format::Json);
        assert!(matches!(cli.command, Commands::Read { id: 42 }));
    }
}
