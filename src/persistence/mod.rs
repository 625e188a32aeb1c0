pub mod coordinator;
pub mod database;
pub mod file;
pub mod traits;

pub use coordinator::{PersistenceCoordinator, PersistenceReport, SinkFailure, SinkWrite};
pub use database::DatabaseSink;
pub use file::{CsvFileSink, JsonFileSink};
pub use traits::RecordSink;

/// Timestamp used in output file names, e.g. `20240131_174502`.
pub fn file_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
