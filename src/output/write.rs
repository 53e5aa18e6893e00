// src/output/write.rs

use std::{fs::File, path::Path};

use parquet::{
    arrow::ArrowWriter, basic::Compression, errors::ParquetError,
    file::properties::WriterProperties,
};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use super::batch::{output_schema, to_record_batch, OUTPUT_COLUMNS, PROVENANCE_COLUMN};
use crate::config::OutputFormat;
use crate::error::{PipelineError, Result};
use crate::process::TypedRecord;
use crate::report::parent_dir;

/// Rows per Arrow batch / Parquet row group.
const CHUNK_ROWS: usize = 65_536;

/// Write the consolidated records to `path` in `format`.
///
/// The file appears atomically: it is written next to the destination and
/// persisted over it only once complete.
#[instrument(level = "info", skip(records), fields(path = %path.display(), rows = records.len()))]
pub fn write_artifact(
    records: &[TypedRecord],
    path: &Path,
    format: OutputFormat,
    provenance: bool,
) -> Result<()> {
    let write_err = |source: std::io::Error| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir).map_err(write_err)?;
    let tmp = NamedTempFile::new_in(dir).map_err(write_err)?;

    let file = tmp.reopen().map_err(write_err)?;
    match format {
        OutputFormat::Parquet => write_parquet(records, file, path, provenance)?,
        OutputFormat::Csv => write_csv(records, file, path, provenance)?,
    }

    tmp.persist(path).map_err(|e| write_err(e.error))?;
    info!(?format, "wrote consolidated artifact");
    Ok(())
}

fn write_parquet(records: &[TypedRecord], file: File, path: &Path, provenance: bool) -> Result<()> {
    let encode_err = |message: String| PipelineError::Artifact {
        path: path.to_path_buf(),
        message,
    };
    let schema = output_schema(provenance);
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(CHUNK_ROWS)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
        .map_err(|e| parquet_error(path, e))?;

    for (idx, chunk) in records.chunks(CHUNK_ROWS).enumerate() {
        let batch = to_record_batch(chunk, &schema, provenance)
            .map_err(|e| encode_err(e.to_string()))?;
        writer.write(&batch).map_err(|e| parquet_error(path, e))?;
        debug!(chunk = idx, rows = batch.num_rows(), "wrote batch");
    }
    writer.close().map_err(|e| parquet_error(path, e))?;
    Ok(())
}

fn write_csv(records: &[TypedRecord], file: File, path: &Path, provenance: bool) -> Result<()> {
    let csv_err = |e: csv::Error| csv_error(path, e);
    let mut wtr = csv::Writer::from_writer(file);

    let mut header: Vec<&str> = OUTPUT_COLUMNS.to_vec();
    if provenance {
        header.push(PROVENANCE_COLUMN);
    }
    wtr.write_record(&header).map_err(csv_err)?;

    for r in records {
        let mut row = vec![
            r.ministry.clone().unwrap_or_default(),
            r.business_unit.clone().unwrap_or_default(),
            r.recipient.clone().unwrap_or_default(),
            r.program.clone().unwrap_or_default(),
            r.amount.map(|a| a.to_string()).unwrap_or_default(),
            r.lottery.map(|b| b.to_string()).unwrap_or_default(),
            r.payment_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            r.fiscal_year.to_string(),
            r.display_fiscal_year.clone(),
        ];
        if provenance {
            row.push(r.source.name.clone());
        }
        wtr.write_record(&row).map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// The output medium failing is a write error; anything else is an encoding error.
fn parquet_error(path: &Path, e: ParquetError) -> PipelineError {
    let artifact = |message: String| PipelineError::Artifact {
        path: path.to_path_buf(),
        message,
    };
    match e {
        ParquetError::External(inner) => match inner.downcast::<std::io::Error>() {
            Ok(source) => PipelineError::Write {
                path: path.to_path_buf(),
                source: *source,
            },
            Err(other) => artifact(other.to_string()),
        },
        other => artifact(other.to_string()),
    }
}

fn csv_error(path: &Path, e: csv::Error) -> PipelineError {
    if !e.is_io_error() {
        return PipelineError::Artifact {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
    }
    match e.into_kind() {
        csv::ErrorKind::Io(source) => PipelineError::Write {
            path: path.to_path_buf(),
            source,
        },
        kind => PipelineError::Artifact {
            path: path.to_path_buf(),
            message: format!("{:?}", kind),
        },
    }
}
