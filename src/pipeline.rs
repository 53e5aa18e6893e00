// src/pipeline.rs

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::stream::{FuturesUnordered, StreamExt};
use rayon::prelude::*;
use tokio::{sync::Semaphore, time::Instant};
use tracing::{error, info, instrument, warn};

use crate::catalog::{scan_catalog, SourceFile};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::output::{merge, write_artifact, FileOutcome};
use crate::process::{local_header, process_file, Coercer, FileBatch};
use crate::read::{read_source, DecodedFile};
use crate::report::{FileReport, ValidationReport};
use crate::schema::CanonicalSchema;

/// What a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub artifact: PathBuf,
    pub report_path: PathBuf,
    pub records: usize,
    pub report: ValidationReport,
}

/// Result of running one file through the pipeline on its own.
#[derive(Debug)]
pub struct SingleFileResult {
    /// Built from this file's header only.
    pub schema: CanonicalSchema,
    pub batch: FileBatch,
}

enum Scanned {
    Ready {
        decoded: DecodedFile,
        header: Vec<String>,
    },
    Failed(FileReport),
}

/// Run the full pipeline described by `config`.
///
/// Only an empty catalog, bad configuration, a crashed worker or a failed
/// write abort the run. Everything else ends up in the report.
#[instrument(level = "info", skip(config), fields(input = %config.input_dir.display()))]
pub async fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let t0 = Instant::now();
    config.validate()?;
    let encodings = config.resolve_encodings()?;

    // ─── 1) catalog ──────────────────────────────────────────────────
    let catalog = scan_catalog(&config.input_dir, &config.file_pattern)?;
    let n_files = catalog.len();

    // ─── 2) decode + header scan, all files in parallel ─────────────
    let scanned: Vec<Scanned> = tokio::task::spawn_blocking(move || {
        catalog
            .into_par_iter()
            .map(|src| scan_one(src, &encodings))
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| PipelineError::Task(e.to_string()))?;

    // ─── 3) barrier: canonical schema is fixed before any coercion ──
    let mut outcomes: BTreeMap<usize, FileOutcome> = BTreeMap::new();
    let mut ready: Vec<(usize, DecodedFile)> = Vec::with_capacity(n_files);
    let mut headers: Vec<Vec<String>> = Vec::with_capacity(n_files);
    for (idx, item) in scanned.into_iter().enumerate() {
        match item {
            Scanned::Ready { decoded, header } => {
                headers.push(header);
                ready.push((idx, decoded));
            }
            Scanned::Failed(report) => {
                outcomes.insert(idx, FileOutcome::Failed(report));
            }
        }
    }
    let schema = Arc::new(CanonicalSchema::union(&headers));
    info!(
        columns = schema.len(),
        decoded = ready.len(),
        failed = outcomes.len(),
        "canonical schema fixed"
    );
    let coercer = Arc::new(Coercer::new(&schema, &config.coercion));

    // ─── 4) per-file transform, bounded by `workers` ────────────────
    let sem = Arc::new(Semaphore::new(config.workers));
    let max_issues = config.coercion.max_issue_samples;
    let mut tasks = FuturesUnordered::new();
    for (idx, decoded) in ready {
        let sem = Arc::clone(&sem);
        let schema = Arc::clone(&schema);
        let coercer = Arc::clone(&coercer);
        tasks.push(tokio::spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))?;
            let batch = tokio::task::spawn_blocking(move || {
                process_file(decoded, &schema, &coercer, max_issues)
            })
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?;
            Ok::<_, PipelineError>((idx, batch))
        }));
    }

    while let Some(joined) = tasks.next().await {
        let (idx, batch) = joined.map_err(|e| {
            error!("worker task crashed: {}", e);
            PipelineError::Task(e.to_string())
        })??;
        outcomes.insert(idx, FileOutcome::Processed(batch));
    }

    // ─── 5) ordered merge + write ───────────────────────────────────
    let consolidated = merge(outcomes);
    let records = consolidated.records.len();

    let artifact = config.output.clone();
    let format = config.format;
    let provenance = config.provenance_column;
    let rows = consolidated.records;
    tokio::task::spawn_blocking({
        let artifact = artifact.clone();
        move || write_artifact(&rows, &artifact, format, provenance)
    })
    .await
    .map_err(|e| PipelineError::Task(e.to_string()))??;

    let report = ValidationReport::finalize(schema.names(), consolidated.reports);
    report.write_json(&config.report)?;

    if report.totals.files_failed > 0 {
        warn!(
            failed = report.totals.files_failed,
            "some files could not be decoded and were skipped"
        );
    }
    info!(
        files = n_files,
        records,
        malformed = report.totals.counts.malformed_rows,
        elapsed = ?t0.elapsed(),
        "run complete"
    );

    Ok(RunSummary {
        artifact,
        report_path: config.report.clone(),
        records,
        report,
    })
}

fn scan_one(src: SourceFile, encodings: &[&'static encoding_rs::Encoding]) -> Scanned {
    let fallback = src.clone();
    match read_source(src, encodings) {
        Ok(decoded) => {
            let header = local_header(&decoded.text);
            Scanned::Ready { decoded, header }
        }
        Err(err) => {
            warn!(file = %fallback.name, "skipping file: {}", err);
            Scanned::Failed(FileReport::failed(&fallback, &err))
        }
    }
}

/// Decode, normalize and coerce a single file against its own header.
///
/// Unlike [`run`], a file that cannot be decoded is an error here.
#[instrument(level = "info", skip(config), fields(path = %path.display()))]
pub fn ingest_single(path: &Path, config: &PipelineConfig) -> Result<SingleFileResult> {
    config.validate()?;
    let encodings = config.resolve_encodings()?;
    let source = SourceFile::from_path(path).ok_or_else(|| PipelineError::MissingFiscalYear {
        path: path.to_path_buf(),
    })?;

    let decoded = read_source(source, &encodings)?;
    let schema = CanonicalSchema::union(&[local_header(&decoded.text)]);
    let coercer = Coercer::new(&schema, &config.coercion);
    let mut batch = process_file(decoded, &schema, &coercer, config.coercion.max_issue_samples);
    batch.report.first_row = Some(0);

    Ok(SingleFileResult { schema, batch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::output::load_consolidated;
    use crate::report::FileStatus;
    use anyhow::Result;
    use arrow::array::{Array, BooleanArray, Date32Array, Float64Array, Int32Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use std::fs;
    use tempfile::{tempdir, TempDir};
    use tracing_subscriber::FmtSubscriber;

    fn init_tracing() {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn fixture(files: &[(&str, &[u8])]) -> Result<(TempDir, PipelineConfig)> {
        let dir = tempdir()?;
        let input = dir.path().join("in");
        fs::create_dir_all(&input)?;
        for (name, body) in files {
            fs::write(input.join(name), body)?;
        }
        let cfg = PipelineConfig {
            input_dir: input,
            output: dir.path().join("out/combined.parquet"),
            report: dir.path().join("out/report.json"),
            workers: 2,
            ..PipelineConfig::default()
        };
        Ok((dir, cfg))
    }

    fn strings(batches: &[RecordBatch], col: &str) -> Vec<Option<String>> {
        batches
            .iter()
            .flat_map(|b| {
                let arr = b
                    .column_by_name(col)
                    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                    .expect("utf8 column");
                (0..arr.len())
                    .map(|i| (!arr.is_null(i)).then(|| arr.value(i).to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn ints(batches: &[RecordBatch], col: &str) -> Vec<i32> {
        batches
            .iter()
            .flat_map(|b| {
                let arr = b
                    .column_by_name(col)
                    .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                    .expect("int32 column");
                arr.values().to_vec()
            })
            .collect()
    }

    #[tokio::test]
    async fn three_files_reconcile_and_stay_in_fiscal_order() -> Result<()> {
        init_tracing();
        // newest file first on disk; catalog order must still win
        let (_dir, cfg) = fixture(&[
            (
                "grants-2016-17.csv",
                b"Ministry,Amount,Lottery\nEnergy,30,Y\nEnergy,31,N\n",
            ),
            (
                "grants-2014-15.csv",
                b"Ministry,Recipient,Amount\nHealth,Clinic,10\nHealth,Lab,11\n",
            ),
            (
                "grants-2015-16.csv",
                b"Ministry,Recipient,Amount,Lottery\nCulture,Museum,20,N\n",
            ),
        ])?;

        let summary = run(&cfg).await?;
        assert_eq!(summary.records, 5);
        assert_eq!(
            summary.report.canonical_columns,
            vec!["Ministry", "Recipient", "Amount", "Lottery"]
        );

        let batches = load_consolidated(&summary.artifact)?;
        assert_eq!(ints(&batches, "FiscalYear"), vec![2014, 2014, 2015, 2016, 2016]);
        assert_eq!(
            strings(&batches, "Recipient"),
            vec![
                Some("Clinic".into()),
                Some("Lab".into()),
                Some("Museum".into()),
                None,
                None
            ]
        );
        assert_eq!(
            strings(&batches, "DisplayFiscalYear")[3],
            Some("2016 - 2017".into())
        );
        assert_eq!(strings(&batches, "Ministry")[0], Some("HEALTH".into()));

        let amounts: Vec<f64> = batches
            .iter()
            .flat_map(|b| {
                b.column_by_name("Amount")
                    .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
                    .expect("float64 column")
                    .values()
                    .to_vec()
            })
            .collect();
        assert_eq!(amounts, vec![10.0, 11.0, 20.0, 30.0, 31.0]);

        let lottery = batches[0]
            .column_by_name("Lottery")
            .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
            .expect("bool column");
        assert!(lottery.is_null(0));
        assert!(!lottery.value(2));
        assert!(lottery.value(3));

        let firsts: Vec<_> = summary.report.files.iter().map(|f| f.first_row).collect();
        assert_eq!(firsts, vec![Some(0), Some(2), Some(3)]);
        Ok(())
    }

    #[tokio::test]
    async fn renamed_headers_still_fill_typed_fields() -> Result<()> {
        init_tracing();
        let (_dir, cfg) = fixture(&[
            (
                "grants-2014-15.csv",
                b"Ministry,Recipient,Amount\nHealth,Clinic,10\n",
            ),
            (
                "grants-2015-16.csv",
                b"Ministry,Payee,Payment Amount\nCulture,Museum,20\n",
            ),
        ])?;

        let summary = run(&cfg).await?;
        assert_eq!(
            summary.report.canonical_columns,
            vec!["Ministry", "Recipient", "Amount", "Payee", "Payment Amount"]
        );
        let newer = &summary.report.files[1];
        assert_eq!(newer.counts.amount_missing, 0);
        assert_eq!(newer.counts.amount_failures, 0);

        let batches = load_consolidated(&summary.artifact)?;
        assert_eq!(
            strings(&batches, "Recipient"),
            vec![Some("Clinic".into()), Some("Museum".into())]
        );
        let amounts: Vec<f64> = batches
            .iter()
            .flat_map(|b| {
                b.column_by_name("Amount")
                    .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
                    .expect("float64 column")
                    .values()
                    .to_vec()
            })
            .collect();
        assert_eq!(amounts, vec![10.0, 20.0]);
        Ok(())
    }

    #[tokio::test]
    async fn rerun_is_byte_identical() -> Result<()> {
        init_tracing();
        let (_dir, cfg) = fixture(&[
            (
                "a-2014-15.csv",
                b"Ministry,Recipient,Amount,PaymentDate\nHealth,Clinic,\"1,000\",2015-03-31\n",
            ),
            (
                "b-2015-16.csv",
                b"Ministry,Recipient,Amount\nHealth,Clinic,oops\nHealth,short\n",
            ),
        ])?;

        let first = run(&cfg).await?;
        let artifact_1 = fs::read(&first.artifact)?;
        let report_1 = fs::read(&first.report_path)?;

        let second = run(&cfg).await?;
        assert_eq!(artifact_1, fs::read(&second.artifact)?);
        assert_eq!(report_1, fs::read(&second.report_path)?);
        assert_eq!(first.report.totals, second.report.totals);
        assert_eq!(second.report.totals.counts.amount_failures, 1);
        assert_eq!(second.report.totals.counts.malformed_rows, 1);
        Ok(())
    }

    #[tokio::test]
    async fn undecodable_file_is_reported_and_skipped() -> Result<()> {
        init_tracing();
        let (_dir, cfg) = fixture(&[
            ("grants-2014-15.csv", b"Recipient,Amount\nClinic,5\n"),
            ("grants-2015-16.csv", b"Recipient,Amount\nbad \x81 byte,6\n"),
        ])?;

        let summary = run(&cfg).await?;
        assert_eq!(summary.records, 1);
        let failed = &summary.report.files[1];
        assert_eq!(failed.status, FileStatus::EncodingFailed);
        assert_eq!(failed.first_row, None);
        assert_eq!(summary.report.totals.files_failed, 1);
        assert!(summary.report.has_structural_loss());
        Ok(())
    }

    #[tokio::test]
    async fn csv_output_keeps_quoted_negative_amount() -> Result<()> {
        init_tracing();
        let (dir, mut cfg) = fixture(&[(
            "grants-2014-15.csv",
            b"Recipient,Amount,Lottery\n\"Smith, J.\",\"-1,250.50\",yes\n",
        )])?;
        cfg.format = OutputFormat::Csv;
        cfg.output = dir.path().join("out/combined.csv");
        cfg.provenance_column = true;

        run(&cfg).await?;
        let text = fs::read_to_string(&cfg.output)?;
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Ministry,BusinessUnit,Recipient,Program,Amount,Lottery,PaymentDate,FiscalYear,DisplayFiscalYear,SourceFile")
        );
        assert_eq!(
            lines.next(),
            Some(",,\"Smith, J.\",,-1250.5,true,,2014,2014 - 2015,grants-2014-15.csv")
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_input_directory_aborts() -> Result<()> {
        let (_dir, cfg) = fixture(&[("notes.txt", b"nothing")])?;
        let err = run(&cfg).await.unwrap_err();
        assert!(matches!(err, PipelineError::Catalog { .. }));
        Ok(())
    }

    #[test]
    fn latin9_and_utf8_copies_coerce_identically() -> Result<()> {
        init_tracing();
        let utf8 = "Ministry,Recipient,Lottery,PaymentDate\nCulture,Société Café,Y,03/31/2015\n";
        let latin: Vec<u8> = utf8
            .chars()
            .map(|c| match c {
                'é' => 0xE9,
                c => c as u8,
            })
            .collect();
        let (_dir, cfg) = fixture(&[
            ("utf8-2014-15.csv", utf8.as_bytes()),
            ("latin-2014-15.csv", latin.as_slice()),
        ])?;

        let a = ingest_single(&cfg.input_dir.join("utf8-2014-15.csv"), &cfg)?;
        let b = ingest_single(&cfg.input_dir.join("latin-2014-15.csv"), &cfg)?;
        assert_eq!(a.batch.report.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(b.batch.report.encoding.as_deref(), Some("ISO-8859-15"));

        let (ra, rb) = (&a.batch.records[0], &b.batch.records[0]);
        assert_eq!(ra.recipient.as_deref(), Some("Société Café"));
        assert_eq!(ra.recipient, rb.recipient);
        assert_eq!(ra.lottery, Some(true));
        assert_eq!(ra.lottery, rb.lottery);
        assert_eq!(ra.payment_date, rb.payment_date);
        assert!(ra.payment_date.is_some());
        Ok(())
    }

    #[test]
    fn single_file_errors_are_surfaced() -> Result<()> {
        let (_dir, cfg) = fixture(&[
            ("no-year.csv", b"Recipient\nX\n"),
            ("grants-2014-15.csv", b"Recipient\n\x81\n"),
        ])?;
        let missing = ingest_single(&cfg.input_dir.join("no-year.csv"), &cfg).unwrap_err();
        assert!(matches!(missing, PipelineError::MissingFiscalYear { .. }));

        let undecodable = ingest_single(&cfg.input_dir.join("grants-2014-15.csv"), &cfg).unwrap_err();
        assert!(matches!(undecodable, PipelineError::Encoding(_)));
        Ok(())
    }

    #[tokio::test]
    async fn payment_dates_land_as_date32() -> Result<()> {
        let (_dir, cfg) = fixture(&[(
            "grants-2014-15.csv",
            b"Recipient,PaymentDate\nClinic,2015-03-31\nLab,someday\n",
        )])?;
        let summary = run(&cfg).await?;
        assert_eq!(summary.report.totals.counts.date_failures, 1);

        let batches = load_consolidated(&summary.artifact)?;
        let dates = batches[0]
            .column_by_name("PaymentDate")
            .and_then(|c| c.as_any().downcast_ref::<Date32Array>())
            .expect("date32 column");
        assert_eq!(dates.value(0), 16525);
        assert!(dates.is_null(1));
        Ok(())
    }
}
