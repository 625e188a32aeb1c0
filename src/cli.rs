use clap::Parser;
use std::path::PathBuf;

use crate::config::{AppConfig, OutputFormat, OutputLayout};

/// Bulk product export for WooCommerce storefronts.
#[derive(Debug, Parser)]
#[command(name = "woo-scraper", version, about)]
pub struct Cli {
    /// Configuration file (JSON or TOML)
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// File output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write to the database only, no files
    #[arg(long, conflicts_with = "no_db")]
    pub db_only: bool,

    /// Disable the database sink
    #[arg(long)]
    pub no_db: bool,

    /// Test mode: stop after `test_mode.limit` products
    #[arg(long)]
    pub test: bool,

    /// Product cap; implies --test
    #[arg(long, value_parser = parse_limit)]
    pub limit: Option<usize>,

    /// Compact records: name, sku_code, main_price, source_url, has_images
    #[arg(long)]
    pub compact: bool,

    /// Write the effective configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    pub write_config: Option<PathBuf>,
}

fn parse_limit(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("limit must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.db_only {
            config.database.enabled = true;
            config.output.format = OutputFormat::None;
        }
        if self.no_db {
            config.database.enabled = false;
        }
        if self.test {
            config.test_mode.enabled = true;
        }
        if let Some(limit) = self.limit {
            config.test_mode.enabled = true;
            config.test_mode.limit = limit;
        }
        if self.compact {
            config.output.layout = OutputLayout::Compact;
        }
    }
}
