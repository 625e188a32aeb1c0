use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;
use validator::Validate;

use crate::models::{Field, SelectorConfig, SelectorSpec};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub test_mode: TestModeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_fields")]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    #[default]
    Http,
    Browser,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScraperConfig {
    #[validate(url)]
    pub base_url: String,
    #[serde(default = "default_max_threads")]
    #[validate(range(min = 1, max = 64))]
    pub max_threads: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    #[validate(range(min = 1))]
    pub timeout: u64,
    /// Extra wait after navigation for the browser fetcher, in milliseconds.
    #[serde(default = "default_page_load_delay")]
    pub page_load_delay: u64,
    /// Politeness delay before every HTTP request, in milliseconds.
    #[serde(default)]
    pub request_delay_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub fetcher: FetcherKind,
    #[serde(default)]
    pub chrome_path: Option<String>,
    #[serde(default = "default_start_page")]
    #[validate(range(min = 1))]
    pub start_page: u32,
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// Listing URL template such as `https://shop.example.com/shop/page/{page}/`.
    #[serde(default)]
    pub page_url_pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
    #[default]
    Both,
    None,
}

impl OutputFormat {
    pub fn writes_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }

    pub fn writes_csv(&self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    #[default]
    Full,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub layout: OutputLayout,
    pub output_dir: PathBuf,
    pub images_dir: PathBuf,
    pub download_images: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Both,
            layout: OutputLayout::Full,
            output_dir: PathBuf::from("output"),
            images_dir: PathBuf::from("output/images"),
            download_images: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub url: String,
    pub table_prefix: String,
    #[validate(range(min = 1))]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "sqlite://scraped_products.db".to_string(),
            table_prefix: "wp_".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TestModeConfig {
    pub enabled: bool,
    #[validate(range(min = 1))]
    pub limit: usize,
}

impl Default for TestModeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some(PathBuf::from("scraper.log")),
        }
    }
}

fn default_max_threads() -> usize {
    5
}

fn default_timeout() -> u64 {
    10
}

fn default_page_load_delay() -> u64 {
    2000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_start_page() -> u32 {
    1
}

fn default_fields() -> Vec<Field> {
    Field::ALL.to_vec()
}

impl ScraperConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_threads: default_max_threads(),
            timeout: default_timeout(),
            page_load_delay: default_page_load_delay(),
            request_delay_ms: 0,
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
            fetcher: FetcherKind::Http,
            chrome_path: None,
            start_page: default_start_page(),
            max_pages: None,
            page_url_pattern: None,
        }
    }
}

impl AppConfig {
    /// Configuration with every default and the given storefront.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            scraper: ScraperConfig::new(base_url),
            output: OutputConfig::default(),
            database: DatabaseConfig::default(),
            test_mode: TestModeConfig::default(),
            logging: LoggingConfig::default(),
            fields: default_fields(),
            selectors: SelectorConfig::default(),
        }
    }

    /// Load from a JSON or TOML file, then apply `WOOSCRAPE__SECTION__KEY` overrides.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::Config(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            ))));
        }

        let s = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("WOOSCRAPE").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Write the effective configuration. The extension picks TOML, anything else is JSON.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
        let contents = if is_toml {
            toml::to_string_pretty(self).map_err(|e| AppError::Internal(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self)?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.scraper.validate()?;
        self.database.validate()?;
        if self.test_mode.enabled {
            self.test_mode.validate()?;
        }

        let base = Url::parse(&self.scraper.base_url)
            .map_err(|_| AppError::Validation("Invalid base URL format".into()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AppError::Validation(
                "base_url must use http or https".into(),
            ));
        }

        if let Some(pattern) = &self.scraper.page_url_pattern {
            if !pattern.contains("{page}") {
                return Err(AppError::Validation(
                    "page_url_pattern must contain a {page} placeholder".into(),
                ));
            }
        }

        if self.scraper.max_pages == Some(0) {
            return Err(AppError::Validation(
                "max_pages must be greater than 0 when set".into(),
            ));
        }

        // The prefix is spliced into DDL and queries.
        if !self
            .database
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::Validation(
                "database.table_prefix may only contain letters, digits and '_'".into(),
            ));
        }

        if self.database.enabled && self.database.url.trim().is_empty() {
            return Err(AppError::Validation(
                "database.url is required when the database is enabled".into(),
            ));
        }

        if self.fields.is_empty() {
            return Err(AppError::Validation(
                "At least one field must be enabled".into(),
            ));
        }

        // Deserialization already rejects empty chains; a hand-built config may not have.
        for field in &self.fields {
            if let Some(spec) = self.selectors.spec_for(*field) {
                ensure_non_empty(field.as_str(), spec)?;
            }
        }
        ensure_non_empty("product_links", &self.selectors.product_links)?;

        Ok(())
    }

    pub fn field_enabled(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    /// Effective test-mode cap, if the run is capped.
    pub fn test_limit(&self) -> Option<usize> {
        self.test_mode.enabled.then_some(self.test_mode.limit)
    }
}

fn ensure_non_empty(name: &str, spec: &SelectorSpec) -> Result<(), AppError> {
    if spec.is_empty() {
        return Err(AppError::Validation(format!(
            "Selector list for '{}' must not be empty",
            name
        )));
    }
    Ok(())
}
