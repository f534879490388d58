// Library surface for the CLI and integration tests.
pub mod app_dirs;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod run_ledger;
pub mod selection;
pub mod vocab_store;

pub use db::Database;
pub use error::{DrillError, Result};
