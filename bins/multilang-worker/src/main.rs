mod cmd;
mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands, WorkerConfig};

fn main() {
    // stdout carries the protocol; diagnostics go to stderr only.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match WorkerConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let input = cli.input.as_deref();
    let result = match cli.command {
        Commands::Spout => cmd::spout::run(&config, input),
        Commands::Bolt => cmd::bolt::run(&config, input),
    };
    if let Err(e) = result {
        tracing::error!(error = %e, "worker stopped");
        std::process::exit(1);
    }
}
