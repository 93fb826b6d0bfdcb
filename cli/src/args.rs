use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tasklog_cli::config::DEFAULT_CONFIG_PATH;

// Macro to create the version string at compile time
macro_rules! version_string {
    () => {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nCommit: ",
            env!("GIT_COMMIT_HASH"),
            " (",
            env!("GIT_BRANCH"),
            ")\nBuilt: ",
            env!("BUILD_DATE")
        )
    };
}

/// tasklog - follow the logs of remote automation runs
#[derive(Parser, Debug)]
#[command(name = "tasklog")]
#[command(version = version_string!())]
#[command(about = "Stream or fetch task logs from the operations backend", long_about = None)]
pub struct Cli {
    /// Backend URL (e.g., http://ops.example.com:8000)
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Bearer token for this invocation only (not stored)
    #[arg(long = "token")]
    pub token: Option<String>,

    /// Configuration file path
    #[arg(long = "config", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Use fast timeout preset (backend on localhost)
    #[arg(long = "fast-timeouts", conflicts_with = "relaxed_timeouts")]
    pub fast_timeouts: bool,

    /// Use relaxed timeout preset (high-latency links, very large logs)
    #[arg(long = "relaxed-timeouts")]
    pub relaxed_timeouts: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow a run's log live; falls back to a snapshot if the stream fails
    Tail {
        task_id: u64,
        work_id: u64,

        /// Fail instead of fetching a snapshot when the stream is unavailable
        #[arg(long = "no-fallback")]
        no_fallback: bool,

        /// Override the reconnect budget (0 disables reconnection)
        #[arg(long = "max-reconnect-attempts", value_name = "N")]
        max_reconnect_attempts: Option<u32>,
    },

    /// Fetch the accumulated log once
    Fetch {
        task_id: u64,
        work_id: u64,

        /// Read the tail straight from the backend buffer (single short attempt)
        #[arg(long = "direct")]
        direct: bool,

        /// Print the snapshot as JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Store a bearer token for later invocations
    Login {
        #[arg(long = "token")]
        token: String,
    },

    /// Forget the stored session
    Logout,
}
