// src/lib.rs

pub mod catalog;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod read;
pub mod report;
pub mod schema;

pub use config::{OutputFormat, PipelineConfig};
pub use error::{PipelineError, Result};
pub use output::load_consolidated;
pub use pipeline::{ingest_single, run, RunSummary, SingleFileResult};
pub use report::ValidationReport;
