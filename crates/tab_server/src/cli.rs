//! Command-line interface for tab_server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tâb game server - authoritative rules, JSON API and live state push
#[derive(Parser, Debug)]
#[command(name = "tab_server")]
#[command(about = "Authoritative server for the Tâb race board game", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration file (optional)
    #[arg(short, long, global = true, default_value = "tab_server.toml")]
    pub config: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Serve {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory for users.json and games.json (overrides the config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Keep everything in memory; nothing is written to disk
        #[arg(long)]
        ephemeral: bool,
    },

    /// Print the leaderboard for a group and board size
    Ranking {
        /// Matchmaking group
        #[arg(short, long)]
        group: u32,

        /// Board columns
        #[arg(short, long)]
        size: usize,

        /// Directory for users.json (overrides the config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}
