//! Input/Output operations
//!
//! Logging setup and JSON export of computed observables.

mod export;
mod output;

pub use export::{export_json, read_json};
pub use output::setup_output;
