// src/main.rs
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use grant_disclosure::{ingest_single, run, OutputFormat, PipelineConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "grant-disclosure")]
#[command(about = "Normalize annual grant disclosure files into one typed dataset")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process every disclosure file in the input directory
    Run {
        /// YAML config file; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding the disclosure files
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Consolidated artifact path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Validation report path (JSON)
        #[arg(long)]
        report: Option<PathBuf>,

        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Files transformed concurrently
        #[arg(long)]
        workers: Option<usize>,

        /// Exit non-zero if a file failed to decode or a row was dropped
        #[arg(long)]
        strict: bool,
    },
    /// Run one file on its own and print its report
    Inspect {
        file: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::from_yaml_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Run {
            config,
            input,
            output,
            report,
            format,
            workers,
            strict,
        } => {
            let mut cfg = load_config(config.as_ref())?;
            if let Some(v) = input {
                cfg.input_dir = v;
            }
            if let Some(v) = output {
                cfg.output = v;
            }
            if let Some(v) = report {
                cfg.report = v;
            }
            if let Some(v) = format {
                cfg.format = v;
            }
            if let Some(v) = workers {
                cfg.workers = v;
            }

            let summary = run(&cfg).await.context("pipeline run failed")?;
            info!(
                artifact = %summary.artifact.display(),
                report = %summary.report_path.display(),
                records = summary.records,
                "done"
            );

            if strict && summary.report.has_structural_loss() {
                let t = &summary.report.totals;
                warn!(
                    files_failed = t.files_failed,
                    malformed_rows = t.counts.malformed_rows,
                    "strict mode: data was lost"
                );
                bail!(
                    "{} file(s) failed to decode, {} malformed row(s) dropped",
                    t.files_failed,
                    t.counts.malformed_rows
                );
            }
        }
        Command::Inspect { file, config } => {
            let cfg = load_config(config.as_ref())?;
            let result = ingest_single(&file, &cfg)
                .with_context(|| format!("inspecting {}", file.display()))?;
            info!(columns = ?result.schema.names(), "header");
            let json = serde_json::to_string_pretty(&result.batch.report)?;
            println!("{}", json);
        }
    }
    Ok(())
}
