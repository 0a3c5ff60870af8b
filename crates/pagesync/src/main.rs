// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pagesync - page conversation sync service.
//!
//! Binary entry point: loads configuration, then serves webhooks or runs a
//! one-shot backfill.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod serve;

/// Pagesync - page conversation sync service.
#[derive(Parser, Debug)]
#[command(name = "pagesync", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook server.
    Serve,
    /// Run a one-shot history backfill for a page.
    Backfill {
        /// Page to backfill.
        page_id: String,
        /// Walk the feed (posts and comments).
        #[arg(long, default_value_t = true)]
        feed: bool,
        /// Walk chat conversations.
        #[arg(long, default_value_t = true)]
        messages: bool,
    },
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match pagesync_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            pagesync_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Backfill {
            page_id,
            feed,
            messages,
        }) => serve::run_backfill(config, &page_id, feed, messages).await,
        Some(Commands::Config) => {
            match toml::to_string_pretty(&config) {
                Ok(rendered) => {
                    println!("{rendered}");
                    Ok(())
                }
                Err(e) => Err(pagesync_core::SyncError::Internal(format!(
                    "failed to render config: {e}"
                ))),
            }
        }
        None => {
            println!("pagesync: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
