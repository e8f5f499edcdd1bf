//! Library maintenance operations.

pub mod purge;
pub mod quality;

pub use purge::{PurgeService, PurgeStats};
pub use quality::{check_collection, QualityReport};
