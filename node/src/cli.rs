//! # CLI Interface
//!
//! Defines the command-line argument structure for `quorum-node` using
//! `clap` derive. Supports three subcommands: `serve`, `demo`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Quorum multi-signature wallet node.
///
/// Hosts wallets and wallet registries in memory, serves a JSON-RPC gateway
/// over them, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "quorum-node",
    about = "Quorum multi-signature wallet node",
    version,
    propagate_version = true
)]
pub struct QuorumNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the JSON-RPC gateway and the metrics endpoint.
    Serve(ServeArgs),
    /// Run the governance walkthrough in memory and print the event log.
    Demo(DemoArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// JSON state file. Loaded at start-up if it exists and written back on
    /// shutdown. Without it, state lives only as long as the process.
    #[arg(long, short = 's', env = "QUORUM_STATE")]
    pub state: Option<PathBuf>,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "QUORUM_RPC_PORT", default_value_t = 8545)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "QUORUM_METRICS_PORT", default_value_t = 9615)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(long, value_enum, env = "QUORUM_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Arguments for the `demo` subcommand.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Print the event log as JSON lines instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Log output format.
    #[arg(long, value_enum, env = "QUORUM_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}
