//! Main entry point for the gymview CLI.

use anyhow::Result;
use clap::Parser;
use gymview_client::{
    cli, commands,
    protocol::TrainingConfig,
    settings::Settings,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::Cli::parse();

    // Load settings
    let settings = Settings::load()?;

    // Initialize logging
    telemetry::init(&settings.logging)?;

    // Execute the requested command
    match args.command {
        cli::Commands::Watch {
            environment,
            algorithm,
            n_episodes,
            max_steps,
            epsilon,
            learning_rate,
            discount_factor,
            n_step,
            step_delay_ms,
        } => {
            let config = TrainingConfig {
                environment,
                algorithm,
                discount_factor,
                learning_rate,
                epsilon,
                n_episodes,
                max_steps,
                n_step,
                step_delay_ms,
            };
            commands::watch(settings, config).await
        }
        cli::Commands::Status { session_id } => commands::status(settings, session_id).await,
        cli::Commands::Stop { session_id } => commands::stop(settings, session_id).await,
        cli::Commands::Delete { session_id } => commands::delete(settings, session_id).await,
        cli::Commands::Environments { id } => commands::environments(settings, id).await,
        cli::Commands::Algorithms { id } => commands::algorithms(settings, id).await,
    }
}
