//! Command-line interface for leaklens.
//!
//! Subcommands:
//!
//! - `serve` — run the REST API over in-memory stores and the bundled
//!   steady-state engine
//! - `import` — parse and import an `.inp` file, printing the report (a
//!   quick way to validate a model before serving it)
//! - `version` — print crate versions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use leaklens_engine::api::{create_router, AppState};
use leaklens_engine::import::DEFAULT_STORAGE_DIR;
use leaklens_engine::{ImportService, Stores};

/// Water-network leak detection and localization.
#[derive(Parser)]
#[command(name = "leaklens", version, about)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the REST API server
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,
        /// Directory for stored EPANET models
        #[arg(long, env = "LEAKLENS_STORAGE_DIR", default_value = DEFAULT_STORAGE_DIR)]
        storage_dir: PathBuf,
    },
    /// Import an EPANET .inp file and print the report
    Import {
        /// Path to the .inp file
        file: PathBuf,
        /// Display name for the created network
        #[arg(long)]
        name: Option<String>,
        /// Directory for stored EPANET models
        #[arg(long, env = "LEAKLENS_STORAGE_DIR", default_value = DEFAULT_STORAGE_DIR)]
        storage_dir: PathBuf,
    },
    /// Print version information
    Version,
}

/// Runs the API server until interrupted.
pub async fn serve(port: u16, storage_dir: PathBuf) -> anyhow::Result<()> {
    let state = AppState::new(&storage_dir);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, storage_dir = %storage_dir.display(), "leaklens API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Imports a model into a fresh store and prints the report as JSON.
pub async fn import(file: PathBuf, name: Option<String>, storage_dir: PathBuf) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&file).await?;
    let service = ImportService::new(Stores::in_memory(), storage_dir);
    let report = service.import_inp(name, &bytes).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
