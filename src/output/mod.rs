// src/output/mod.rs

pub mod batch;
pub mod load;
pub mod write;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::process::{FileBatch, TypedRecord};
use crate::report::FileReport;

pub use batch::{output_schema, OUTPUT_COLUMNS};
pub use load::load_consolidated;
pub use write::write_artifact;

/// What became of one catalog entry.
#[derive(Debug)]
pub enum FileOutcome {
    Processed(FileBatch),
    /// Could not be decoded; contributes no records.
    Failed(FileReport),
}

/// All records of a run in output order, plus per-file reports in catalog order.
#[derive(Debug, Default)]
pub struct Consolidated {
    pub records: Vec<TypedRecord>,
    pub reports: Vec<FileReport>,
}

/// Concatenate per-file outcomes by catalog index.
///
/// The map key is the file's position in the catalog, so the result does not
/// depend on the order in which workers finished.
pub fn merge(outcomes: BTreeMap<usize, FileOutcome>) -> Consolidated {
    let total: usize = outcomes
        .values()
        .map(|o| match o {
            FileOutcome::Processed(b) => b.records.len(),
            FileOutcome::Failed(_) => 0,
        })
        .sum();

    let mut out = Consolidated {
        records: Vec::with_capacity(total),
        reports: Vec::with_capacity(outcomes.len()),
    };
    for (idx, outcome) in outcomes {
        match outcome {
            FileOutcome::Processed(mut batch) => {
                batch.report.first_row = Some(out.records.len() as u64);
                debug!(idx, file = %batch.source.name, records = batch.records.len(), "merging");
                out.records.append(&mut batch.records);
                out.reports.push(batch.report);
            }
            FileOutcome::Failed(report) => {
                debug!(idx, file = %report.file, "skipping failed file");
                out.reports.push(report);
            }
        }
    }
    info!(records = out.records.len(), files = out.reports.len(), "merged");
    out
}
