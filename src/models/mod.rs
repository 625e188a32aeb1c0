use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod field;
pub mod product;

pub use field::*;
pub use product::*;

/// Where one product URL sits in the discovery order. The index is only used in logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub index: usize,
    pub url: String,
}

impl WorkItem {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
        }
    }
}

/// Short id used to tag a run's log lines.
pub fn generate_run_id() -> String {
    Uuid::new_v4().simple().to_string()
}
