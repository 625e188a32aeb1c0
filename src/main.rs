use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use woo_scraper::cli::Cli;
use woo_scraper::pipeline::ShutdownController;
use woo_scraper::{logging, AppConfig, Pipeline};

const FATAL_EXIT: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(FATAL_EXIT)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::from_file(&cli.config)
        .with_context(|| format!("Loading {}", cli.config.display()))?;
    cli.apply(&mut config);
    config.validate()?;

    if let Some(path) = &cli.write_config {
        config.save(path)?;
        println!("Configuration written to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let _log_guard = logging::init(&config.logging)?;
    info!("Starting woo-scraper for {}", config.scraper.base_url);

    let shutdown = Arc::new(ShutdownController::new());
    let listener = shutdown.listen_for_ctrl_c();

    let pipeline = Pipeline::from_config(&config, Arc::clone(&shutdown)).await?;
    let result = pipeline.run().await;
    listener.abort();

    let report = result?;
    report.log_summary();
    Ok(ExitCode::from(report.status.exit_code()))
}
