use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// GreenFloor — an automated market-making daemon for Chia offer venues.
#[derive(Parser)]
#[command(name = "greenfloor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon loop until stopped.
    Run {
        #[arg(long, default_value = "program.yaml")]
        program_config: PathBuf,
        #[arg(long, default_value = "markets.yaml")]
        markets_config: PathBuf,
        #[arg(long)]
        markets_overlay: Option<PathBuf>,
    },

    /// Run exactly one cycle then exit.
    Once {
        #[arg(long, default_value = "program.yaml")]
        program_config: PathBuf,
        #[arg(long, default_value = "markets.yaml")]
        markets_config: PathBuf,
        #[arg(long)]
        markets_overlay: Option<PathBuf>,
    },

    /// Check connectivity to the indexer, venues, and the store.
    Doctor {
        #[arg(long, default_value = "program.yaml")]
        program_config: PathBuf,
    },

    /// List registered daemon instances.
    Ps {
        #[arg(long)]
        home_dir: Option<PathBuf>,
    },

    /// Stop a registered daemon by name.
    Stop {
        name: String,
        #[arg(long)]
        home_dir: Option<PathBuf>,
    },

    /// Tail a daemon's log file.
    Logs {
        name: String,
        #[arg(long, default_value = "100")]
        lines: usize,
        #[arg(long, short = 'f')]
        follow: bool,
        #[arg(long)]
        home_dir: Option<PathBuf>,
    },

    /// Key management subcommands.
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },

    /// Print recent audit-event counters for a running daemon's store.
    Metrics {
        #[arg(long, default_value = "program.yaml")]
        program_config: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Interactively onboard a signing key (import, generate, or reuse
    /// existing `chia keys`).
    Onboard {
        #[arg(long)]
        chia_keys_dir: Option<PathBuf>,
    },
}
