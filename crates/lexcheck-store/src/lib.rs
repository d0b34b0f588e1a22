//! Storage layer: per-reviewer annotation files and key-scheme migration.

mod error;
mod import;
pub mod migrate;
mod reviewer;
mod store;

pub use error::StoreError;
pub use import::ImportReport;
pub use migrate::{
    BatchReport, KeyConflict, MigrationOutcome, MigrationReport, RawRecords, migrate_directory,
    migrate_records,
};
pub use reviewer::ReviewerId;
pub use store::{AnnotationStore, StoreMeta};
