//! reddit-face CLI entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod args;
mod commands;
mod config;

use args::{Cli, Commands, FaceCommands};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Config management must work without a valid configuration
        Commands::Config(args) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"))?;
            commands::config::execute(args, cli.config).await
        }
        Commands::Face(command) => {
            let config = AppConfig::load(cli.config.as_deref())?;

            let log_level = cli
                .log_level
                .as_deref()
                .unwrap_or(&config.general.log_level);
            init_logging(log_level)?;

            match command {
                FaceCommands::Post(args) => commands::post::execute(args, &config).await,
                FaceCommands::Score(args) => commands::score::execute(args, &config).await,
                FaceCommands::Scrap(args) => commands::scrap::execute(args, &config).await,
                FaceCommands::Strategies(args) => {
                    commands::strategies::execute(args, &config).await
                }
                FaceCommands::SetStrategy(args) => {
                    commands::set_strategy::execute(args, &config).await
                }
                FaceCommands::Reset => commands::reset::execute(&config).await,
                FaceCommands::Schema => commands::schema::execute(&config).await,
            }
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}
