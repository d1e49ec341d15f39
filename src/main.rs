mod app;
mod cli;
mod config;
mod digest;
mod error;
mod event;
mod export;
mod mailer;
mod scheduler;
mod server;
mod store;
mod summary;

use anyhow::Result;
use clap::Parser;
use std::{fs::OpenOptions, path::Path};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = config::AppConfig::load(cli.config_path.as_deref())?;
    init_tracing(config.logging.file.as_deref())?;
    for warning in &config.env_warnings {
        tracing::warn!("{warning}");
    }
    let app = app::App::new(config);
    app.run(cli.command).await
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| anyhow::anyhow!("failed to open log file {}: {err}", path.display()))?;
            let _ = builder
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
    Ok(())
}
