use async_trait::async_trait;

use crate::models::ProductRecord;
use crate::utils::error::PersistenceError;

/// One persistence target. `write` receives the complete snapshot and returns a short
/// description of where it went (a path, a row count).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSink: Send + Sync {
    fn name(&self) -> &str;

    async fn write(&self, records: &[ProductRecord]) -> Result<String, PersistenceError>;
}
