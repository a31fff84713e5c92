//! Leaklens CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use leaklens_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, storage_dir } => {
            leaklens_cli::serve(port, storage_dir).await?;
        }
        Commands::Import {
            file,
            name,
            storage_dir,
        } => {
            leaklens_cli::import(file, name, storage_dir).await?;
        }
        Commands::Version => {
            println!("leaklens {}", env!("CARGO_PKG_VERSION"));
            println!("engine {}", leaklens_engine::VERSION);
            println!("epanet {}", leaklens_epanet::VERSION);
        }
    }

    Ok(())
}
