use std::{fs::File, path::Path};

use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, instrument};

use crate::error::{PipelineError, Result};

/// Load a consolidated Parquet artifact for a presentation layer.
///
/// Reads what a previous run wrote; it never re-runs the pipeline.
#[instrument(level = "info", fields(path = %path.display()))]
pub fn load_consolidated(path: &Path) -> Result<Vec<RecordBatch>> {
    let read_err = |message: String| PipelineError::Artifact {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| read_err(e.to_string()))?
        .with_batch_size(8192)
        .build()
        .map_err(|e| read_err(e.to_string()))?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| read_err(e.to_string()))?;
    debug!(
        batches = batches.len(),
        rows = batches.iter().map(|b| b.num_rows()).sum::<usize>(),
        "loaded consolidated dataset"
    );
    Ok(batches)
}
