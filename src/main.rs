//! Drover CLI entry point.

use clap::Parser;

use drover::cli::{handle_error, Cli, Commands};
use drover::infrastructure::config::ConfigLoader;
use drover::infrastructure::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // Keep the appender guard alive for the process lifetime.
    let _guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Scan(args) => drover::cli::commands::scan::execute(&config, args, cli.json).await,
        Commands::Status(args) => {
            drover::cli::commands::status::execute(&config, args, cli.json).await
        }
        Commands::Daemon(args) => {
            drover::cli::commands::daemon::execute(&config, args, cli.json).await
        }
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
