// src/config.rs

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use serde::Deserialize;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Artifact format written by the merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Parquet,
    Csv,
}

/// Everything a run needs. Loaded from YAML; every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    /// Glob applied inside `input_dir` (non-recursive).
    pub file_pattern: String,
    pub output: PathBuf,
    pub report: PathBuf,
    pub format: OutputFormat,
    /// Upper bound on concurrently transformed files.
    pub workers: usize,
    /// WHATWG labels, tried in order.
    pub encodings: Vec<String>,
    /// Append a `SourceFile` column to the artifact.
    pub provenance_column: bool,
    pub coercion: CoercionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            file_pattern: "*".into(),
            output: PathBuf::from("grant_disclosure_combined.parquet"),
            report: PathBuf::from("validation_report.json"),
            format: OutputFormat::Parquet,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            encodings: vec![
                "utf-8".into(),
                "iso-8859-15".into(),
                "windows-1252".into(),
            ],
            provenance_column: false,
            coercion: CoercionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoercionConfig {
    /// chrono format strings, tried in order.
    pub date_formats: Vec<String>,
    pub true_tokens: Vec<String>,
    pub false_tokens: Vec<String>,
    pub uppercase_ministry: bool,
    /// Per-file cap on recorded coercion/malformed-row samples.
    pub max_issue_samples: usize,
    /// Typed field name → accepted source column names. Merged over the defaults.
    pub aliases: BTreeMap<String, Vec<String>>,
}

impl Default for CoercionConfig {
    fn default() -> Self {
        let formats = [
            "%Y-%m-%d",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y/%m/%d",
            "%Y/%m/%d %H:%M:%S",
            "%m/%d/%Y",
            "%m/%d/%Y %H:%M:%S",
            "%d-%b-%y",
            "%d-%b-%Y",
            "%Y%m%d",
            "%B %d, %Y",
        ];
        Self {
            date_formats: formats.iter().map(|f| f.to_string()).collect(),
            true_tokens: ["y", "yes", "true", "t", "1"].map(String::from).to_vec(),
            false_tokens: ["n", "no", "false", "f", "0"].map(String::from).to_vec(),
            uppercase_ministry: true,
            max_issue_samples: 50,
            aliases: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Read a YAML config file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = serde_yaml::from_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Resolve the configured encoding labels, in order.
    pub fn resolve_encodings(&self) -> Result<Vec<&'static Encoding>> {
        if self.encodings.is_empty() {
            return Err(PipelineError::Config("`encodings` must not be empty".into()));
        }
        self.encodings
            .iter()
            .map(|label| {
                Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
                    PipelineError::Config(format!("unknown encoding label `{}`", label))
                })
            })
            .collect()
    }

    /// Checks that can fail before any file is touched.
    pub fn validate(&self) -> Result<()> {
        self.resolve_encodings()?;
        if self.workers == 0 {
            return Err(PipelineError::Config("`workers` must be at least 1".into()));
        }
        if self.coercion.date_formats.is_empty() {
            return Err(PipelineError::Config(
                "`coercion.date_formats` must not be empty".into(),
            ));
        }
        Ok(())
    }
}
