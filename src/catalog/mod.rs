// src/catalog/mod.rs

mod fiscal_year;

pub use fiscal_year::FiscalYearLabel;

use std::{
    fs,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use glob::{glob, Pattern};
use tracing::{debug, info, instrument, warn};

use crate::error::{PipelineError, Result};

/// One candidate disclosure file.
///
/// `encoding` is `None` until the reader has decoded the file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
    pub fiscal_year: FiscalYearLabel,
    pub encoding: Option<&'static Encoding>,
    pub byte_size: u64,
}

impl SourceFile {
    /// Build a descriptor for `path`, or `None` if its name carries no fiscal-year token.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_string();
        let fiscal_year = FiscalYearLabel::from_file_name(&name)?;
        let byte_size = match fs::metadata(path) {
            Ok(m) => m.len(),
            Err(e) => {
                debug!(path = %path.display(), "cannot stat file, size unknown: {}", e);
                0
            }
        };
        Some(Self {
            path: path.to_path_buf(),
            name,
            fiscal_year,
            encoding: None,
            byte_size,
        })
    }

    pub fn with_encoding(self, encoding: &'static Encoding) -> Self {
        Self {
            encoding: Some(encoding),
            ..self
        }
    }

    pub fn encoding_name(&self) -> Option<&'static str> {
        self.encoding.map(|e| e.name())
    }
}

/// List the disclosure files in `dir`, oldest fiscal year first.
///
/// Ties on fiscal year are broken by file name so the order is stable
/// across runs.
#[instrument(level = "info", skip(dir), fields(dir = %dir.as_ref().display()))]
pub fn scan_catalog<P: AsRef<Path>>(dir: P, pattern: &str) -> Result<Vec<SourceFile>> {
    let dir = dir.as_ref();
    let full = format!("{}/{}", Pattern::escape(&dir.to_string_lossy()), pattern);
    let entries = glob(&full)
        .map_err(|e| PipelineError::Config(format!("bad file pattern `{}`: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!("cannot read catalog entry: {}", e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        match SourceFile::from_path(&path) {
            Some(src) => files.push(src),
            None => debug!(path = %path.display(), "no fiscal-year token, skipping"),
        }
    }

    if files.is_empty() {
        return Err(PipelineError::Catalog {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }

    files.sort_by(|a, b| {
        a.fiscal_year
            .start
            .cmp(&b.fiscal_year.start)
            .then_with(|| a.name.cmp(&b.name))
    });

    info!(files = files.len(), "catalog scanned");
    for f in &files {
        debug!(file = %f.name, fiscal_year = %f.fiscal_year, bytes = f.byte_size, "catalog entry");
    }
    Ok(files)
}
