//! Lecture relay CLI entry point.

use anyhow::Result;
use clap::Parser;
use lecture_relay::cli::{commands, Cli, Commands};
use lecture_relay::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The server logs requests at info by default; one-shot commands stay quiet.
    let log_level = match (cli.verbose, &cli.command) {
        (0, Commands::Serve { .. }) => "info",
        (0, _) => "warn",
        (1, _) => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("lecture_relay={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&Settings::expand_path(path)))?,
        None => Settings::load()?,
    };

    // Execute command
    match &cli.command {
        Commands::Serve { host, port } => {
            commands::run_serve(host.as_deref(), *port, settings).await?;
        }

        Commands::Analyze {
            input,
            prompt,
            prompt_file,
            output,
        } => {
            commands::run_analyze(
                input,
                prompt.as_deref(),
                prompt_file.as_deref(),
                output.as_deref(),
                settings,
            )
            .await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, &settings, cli.config.as_deref())?;
        }
    }

    Ok(())
}
