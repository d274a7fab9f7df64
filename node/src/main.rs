// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quorum Node
//!
//! Entry point for the `quorum-node` binary. Parses CLI arguments, initializes
//! logging and metrics, and serves the wallet runtime over HTTP.
//!
//! The binary supports three subcommands:
//!
//! - `serve`: serve the JSON-RPC gateway and metrics endpoint
//! - `demo`: run the governance walkthrough and print the event log
//! - `version`: print build version information

mod api;
mod cli;
mod demo;
mod logging;
mod metrics;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::signal;

use quorum_contracts::Runtime;

use cli::{Commands, QuorumNodeCli};
use logging::LogConfig;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = QuorumNodeCli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Demo(args) => run_demo(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Serves the API and metrics endpoints until a shutdown signal arrives,
/// then writes the state file if one was given.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    logging::init(LogConfig::serve(args.log_format))?;

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        state = ?args.state,
        "starting quorum-node"
    );

    // --- Runtime ---
    let runtime = match &args.state {
        Some(path) => state::load(path)?,
        None => Runtime::new(),
    };

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics.wallets_deployed.set(api::count_wallets(&runtime));

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        runtime: Arc::new(RwLock::new(runtime)),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state.clone());
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    if let Some(path) = &args.state {
        let runtime = app_state.runtime.read();
        state::save(path, &runtime)?;
    }

    tracing::info!("quorum-node stopped");
    Ok(())
}

/// Runs the governance walkthrough and prints the resulting event log to
/// stdout.
fn run_demo(args: cli::DemoArgs) -> Result<()> {
    logging::init(LogConfig::demo(args.log_format))?;

    let outcome = demo::run().context("demo walkthrough failed")?;
    let logs = outcome.runtime.logs();

    if args.json {
        for entry in logs {
            println!("{}", serde_json::to_string(entry)?);
        }
        return Ok(());
    }

    println!("Registry : {}", outcome.registry);
    println!("Wallet   : {}", outcome.wallet);
    println!("Counter  : {}", outcome.counter);
    println!(
        "Owners   : {}",
        outcome
            .runtime
            .owners(&outcome.wallet)?
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Added    : {}", outcome.new_owner);
    println!();
    println!("{:>4}  {:<42}  {:<34} DETAILS", "SEQ", "EMITTER", "EVENT");
    for entry in logs {
        println!("{}", demo::format_entry(entry));
    }
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("quorum-node {}", env!("CARGO_PKG_VERSION"));
    println!("state     v{}", quorum_contracts::config::STATE_VERSION);
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
