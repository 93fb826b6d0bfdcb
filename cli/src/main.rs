//! tasklog - terminal client for remote task logs
//!
//! # Usage
//!
//! ```bash
//! # Store a token once
//! tasklog -u http://ops.example.com:8000 login --token <JWT>
//!
//! # Follow a run live (falls back to a snapshot if streaming fails)
//! tasklog tail 42 7
//!
//! # One-shot fetch, or the buffered tail only
//! tasklog fetch 42 7
//! tasklog fetch 42 7 --direct
//! ```

use std::sync::Arc;

use clap::Parser;

use tasklog_cli::{apply_overrides, build_client, load_config, Overrides, Result, TerminalRedirect};
use tasklog_link::LinkTimeouts;

mod args;
mod commands;

use args::{Cli, Command};
use commands::fetch::handle_fetch;
use commands::login::{handle_login, handle_logout};
use commands::tail::handle_tail;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli.config)?;

    let timeouts = if cli.fast_timeouts {
        Some(LinkTimeouts::fast())
    } else if cli.relaxed_timeouts {
        Some(LinkTimeouts::relaxed())
    } else {
        None
    };
    let max_reconnect_attempts = match &cli.command {
        Command::Tail {
            max_reconnect_attempts,
            ..
        } => *max_reconnect_attempts,
        _ => None,
    };
    let manages_session = matches!(cli.command, Command::Login { .. } | Command::Logout);
    if manages_session {
        // login/logout act on the stored session, not on a transient token
        config.token = None;
    }
    let overrides = Overrides {
        url: cli.url.clone(),
        token: if manages_session { None } else { cli.token.clone() },
        timeouts,
        max_reconnect_attempts,
    };
    apply_overrides(&mut config, &overrides);

    let client = build_client(&config, &overrides, Arc::new(TerminalRedirect))?;
    log::debug!("Using backend {}", client.base_url());

    match cli.command {
        Command::Tail {
            task_id,
            work_id,
            no_fallback,
            ..
        } => handle_tail(&client, task_id, work_id, !no_fallback).await,
        Command::Fetch {
            task_id,
            work_id,
            direct,
            json,
        } => handle_fetch(&client, task_id, work_id, direct, json).await,
        Command::Login { token } => handle_login(&client, &token),
        Command::Logout => handle_logout(&client),
    }
}
