// src/process/mod.rs

pub mod coerce;
pub mod date_parser;
pub mod normalize;
pub mod record;
pub mod utils;

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::catalog::SourceFile;
use crate::read::DecodedFile;
use crate::report::FileReport;
use crate::schema::{reconcile, CanonicalSchema};

pub use coerce::Coercer;
pub use normalize::{Cell, RawRow, RawRows};
pub use record::TypedRecord;

/// Everything one file contributes to the run.
#[derive(Debug)]
pub struct FileBatch {
    pub source: Arc<SourceFile>,
    pub records: Vec<TypedRecord>,
    pub report: FileReport,
}

/// Header of a decoded file, as the normalizer sees it.
pub fn local_header(text: &str) -> Vec<String> {
    RawRows::new(text).header().to_vec()
}

/// Normalize, reconcile and coerce one decoded file.
///
/// `schema` must already be the final canonical schema for the run.
#[instrument(level = "info", skip_all, fields(file = %decoded.source.name))]
pub fn process_file(
    decoded: DecodedFile,
    schema: &CanonicalSchema,
    coercer: &Coercer,
    max_issues: usize,
) -> FileBatch {
    let source = Arc::new(decoded.source);
    let mut report = FileReport::new(&source, max_issues);
    let mut records = Vec::new();

    let rows = RawRows::new(&decoded.text);
    let mapping = schema.mapping(rows.header());
    debug!(
        columns = rows.header().len(),
        unmapped = mapping.unmapped(),
        "mapped header"
    );

    for item in rows {
        report.counts.rows_read += 1;
        match item {
            Ok(raw) => {
                let reconciled = reconcile(&raw, &mapping, schema);
                if reconciled.dropped_unmapped {
                    report.record_unmapped(raw.line);
                }
                records.push(coercer.coerce(&reconciled.row, &source, raw.line, &mut report));
            }
            Err(err) => {
                debug!("dropping malformed row: {}", err);
                report.record_malformed(&err);
            }
        }
    }
    report.counts.records = records.len() as u64;

    info!(
        rows = report.counts.rows_read,
        records = report.counts.records,
        malformed = report.counts.malformed_rows,
        amount_failures = report.counts.amount_failures,
        date_failures = report.counts.date_failures,
        "file processed"
    );

    FileBatch {
        source,
        records,
        report,
    }
}
