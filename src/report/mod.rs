// src/report/mod.rs

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::catalog::SourceFile;
use crate::error::{EncodingError, MalformedRowError, PipelineError, Result};

/// Typed fields that can fail coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercedField {
    Amount,
    Lottery,
    PaymentDate,
}

/// A field that could not be coerced; the record keeps a null in its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("line {line}: cannot read {field:?} from `{value}`")]
pub struct CoercionFailure {
    pub line: u64,
    pub field: CoercedField,
    pub value: String,
}

/// One sampled data-quality problem, for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    MalformedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
    Coercion(CoercionFailure),
    UnmappedColumns {
        line: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Ok,
    EncodingFailed,
    Unreadable,
}

/// Counters shared by per-file entries and the run total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub rows_read: u64,
    pub malformed_rows: u64,
    pub records: u64,
    pub amount_failures: u64,
    pub amount_missing: u64,
    pub date_failures: u64,
    pub lottery_failures: u64,
    pub unmapped_column_rows: u64,
    pub fiscal_year_mismatches: u64,
}

impl Counters {
    fn add(&mut self, other: &Counters) {
        self.rows_read += other.rows_read;
        self.malformed_rows += other.malformed_rows;
        self.records += other.records;
        self.amount_failures += other.amount_failures;
        self.amount_missing += other.amount_missing;
        self.date_failures += other.date_failures;
        self.lottery_failures += other.lottery_failures;
        self.unmapped_column_rows += other.unmapped_column_rows;
        self.fiscal_year_mismatches += other.fiscal_year_mismatches;
    }
}

/// Validation summary for one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub file: String,
    pub path: PathBuf,
    pub fiscal_year: i32,
    pub display_fiscal_year: String,
    pub byte_size: u64,
    pub encoding: Option<String>,
    pub status: FileStatus,
    pub error: Option<String>,
    /// Index of this file's first record in the consolidated artifact.
    pub first_row: Option<u64>,
    #[serde(flatten)]
    pub counts: Counters,
    pub issues: Vec<Issue>,
    #[serde(skip)]
    max_issues: usize,
}

impl FileReport {
    pub fn new(source: &SourceFile, max_issues: usize) -> Self {
        Self {
            file: source.name.clone(),
            path: source.path.clone(),
            fiscal_year: source.fiscal_year.fiscal_year(),
            display_fiscal_year: source.fiscal_year.display(),
            byte_size: source.byte_size,
            encoding: source.encoding_name().map(str::to_string),
            status: FileStatus::Ok,
            error: None,
            first_row: None,
            counts: Counters::default(),
            issues: Vec::new(),
            max_issues,
        }
    }

    /// A file that never produced text.
    pub fn failed(source: &SourceFile, err: &EncodingError) -> Self {
        let status = match err {
            EncodingError::Undecodable { .. } => FileStatus::EncodingFailed,
            EncodingError::Unreadable { .. } => FileStatus::Unreadable,
        };
        Self {
            status,
            error: Some(err.to_string()),
            ..Self::new(source, 0)
        }
    }

    pub fn record_malformed(&mut self, err: &MalformedRowError) {
        self.counts.malformed_rows += 1;
        self.push_issue(Issue::MalformedRow {
            line: err.line,
            expected: err.expected,
            found: err.found,
        });
    }

    pub fn record_coercion(&mut self, failure: CoercionFailure) {
        match failure.field {
            CoercedField::Amount => self.counts.amount_failures += 1,
            CoercedField::Lottery => self.counts.lottery_failures += 1,
            CoercedField::PaymentDate => self.counts.date_failures += 1,
        }
        self.push_issue(Issue::Coercion(failure));
    }

    pub fn record_unmapped(&mut self, line: u64) {
        self.counts.unmapped_column_rows += 1;
        self.push_issue(Issue::UnmappedColumns { line });
    }

    fn push_issue(&mut self, issue: Issue) {
        if self.issues.len() < self.max_issues {
            self.issues.push(issue);
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status != FileStatus::Ok
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub files: u64,
    pub files_failed: u64,
    #[serde(flatten)]
    pub counts: Counters,
}

/// Run-level validation report. Frozen once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub canonical_columns: Vec<String>,
    pub files: Vec<FileReport>,
    pub totals: Totals,
}

impl ValidationReport {
    pub fn finalize(canonical_columns: Vec<String>, files: Vec<FileReport>) -> Self {
        let mut totals = Totals {
            files: files.len() as u64,
            ..Totals::default()
        };
        for f in &files {
            if f.is_failed() {
                totals.files_failed += 1;
            }
            totals.counts.add(&f.counts);
        }
        Self {
            canonical_columns,
            files,
            totals,
        }
    }

    /// Whole files lost or rows dropped; used by `--strict`.
    pub fn has_structural_loss(&self) -> bool {
        self.totals.files_failed > 0 || self.totals.counts.malformed_rows > 0
    }

    /// Pretty JSON with a trailing newline, written atomically.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let write_err = |source: std::io::Error| PipelineError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = parent_dir(path);
        fs::create_dir_all(dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        info!(path = %path.display(), "wrote validation report");
        Ok(())
    }
}

pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
