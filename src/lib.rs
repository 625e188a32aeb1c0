pub mod cli;
pub mod config;
pub mod discovery;
pub mod extractor;
pub mod fetcher;
pub mod images;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod selector_engine;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::ProductRecord;
pub use pipeline::{Pipeline, RunReport, RunStatus};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
