// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley - multi-tenant customer messaging backend.
//!
//! This is the binary entry point: the HTTP server plus operator commands
//! for migrations and webhook replay.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod webhooks;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parley_config::ParleyConfig;

/// Parley - multi-tenant customer messaging backend.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve,
    /// Apply database migrations and exit.
    Migrate,
    /// Inspect and replay recorded webhook events.
    Webhooks {
        #[command(subcommand)]
        action: WebhookCommands,
    },
}

#[derive(Subcommand, Debug)]
enum WebhookCommands {
    /// Events that were recorded but never finalized, oldest first.
    ListUnprocessed {
        #[arg(long)]
        channel: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Disable colors even on a terminal.
        #[arg(long)]
        plain: bool,
    },
    /// Events whose processing failed, newest first.
    ListFailed {
        #[arg(long)]
        channel: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        plain: bool,
    },
    /// Run a recorded payload through the pipeline again.
    Replay {
        /// Webhook event id.
        id: i64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => parley_config::load_and_validate_path(path),
        None => parley_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            parley_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.server.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Migrate) => serve::run_migrate(&config).await,
        Some(Commands::Webhooks { action }) => run_webhooks(&config, action).await,
        None => {
            println!("parley: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run_webhooks(
    config: &ParleyConfig,
    action: WebhookCommands,
) -> Result<(), parley_core::ParleyError> {
    match action {
        WebhookCommands::ListUnprocessed {
            channel,
            limit,
            json,
            plain,
        } => {
            let listing = webhooks::Listing::Unprocessed;
            webhooks::run_list(config, listing, channel, limit, json, plain).await
        }
        WebhookCommands::ListFailed {
            channel,
            limit,
            json,
            plain,
        } => {
            let listing = webhooks::Listing::Failed;
            webhooks::run_list(config, listing, channel, limit, json, plain).await
        }
        WebhookCommands::Replay { id } => webhooks::run_replay(config, id).await,
    }
}

/// `RUST_LOG` wins when set; otherwise `parley*` targets log at the
/// configured level and everything else at `warn`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "parley={log_level},parley_chat={log_level},parley_bus={log_level},\
             parley_gateway={log_level},parley_storage={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_webhook_listing() {
        let cli = Cli::parse_from([
            "parley",
            "webhooks",
            "list-failed",
            "--channel",
            "3",
            "--json",
        ]);
        match cli.command {
            Some(Commands::Webhooks {
                action:
                    WebhookCommands::ListFailed {
                        channel,
                        limit,
                        json,
                        plain,
                    },
            }) => {
                assert_eq!(channel, 3);
                assert_eq!(limit, 20);
                assert!(json);
                assert!(!plain);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_replay_with_global_config() {
        let cli = Cli::parse_from(["parley", "webhooks", "replay", "42", "--config", "p.toml"]);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("p.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Webhooks {
                action: WebhookCommands::Replay { id: 42 }
            })
        ));
    }
}
