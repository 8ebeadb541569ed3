//! Batch command - extract items from many receipt files concurrently.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use futures_util::stream::{self, StreamExt};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, warn};

use rcpt_core::models::receipt::ExtractionResult;
use rcpt_core::{ExtractOptions, ReceiptPipeline};

use super::extract::{OutputFormat, build_options, format_result};
use super::{build_pipeline, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Vendor hint applied to every file
    #[arg(long)]
    vendor: Option<String>,
}

/// Result of processing a single file.
struct FileResult {
    path: PathBuf,
    result: Option<ExtractionResult>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let pipeline = Arc::new(build_pipeline(&config)?);

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "txt" | "text" | "ocr")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files",
            )?
            .progress_chars("=>-"),
    );

    let options = build_options(args.vendor.clone(), false, None, None);
    let jobs = args.jobs.max(1);

    let mut pending = stream::iter(files)
        .map(|path| {
            let pipeline = Arc::clone(&pipeline);
            let options = options.clone();
            tokio::task::spawn_blocking(move || process_file(&pipeline, path, &options))
        })
        .buffered(jobs);

    let mut results = Vec::new();
    while let Some(joined) = pending.next().await {
        let file_result = joined?;
        progress.inc(1);

        if let Some(message) = &file_result.error {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", file_result.path.display(), message);
            } else {
                error!("Failed to process {}: {}", file_result.path.display(), message);
                progress.abandon();
                anyhow::bail!("Processing failed: {}", message);
            }
        }
        results.push(file_result);
    }

    progress.finish_and_clear();

    let mut succeeded = 0;
    for file_result in &results {
        let Some(result) = &file_result.result else {
            continue;
        };
        succeeded += 1;

        if let Some(output_dir) = &args.output_dir {
            let stem = file_result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("receipt");
            let extension = match args.format {
                OutputFormat::Json => "json",
                OutputFormat::Csv => "csv",
                OutputFormat::Text => "txt",
            };
            let output_path = output_dir.join(format!("{}.{}", stem, extension));
            fs::write(&output_path, format_result(result, args.format)?)?;
        }
    }

    if args.summary {
        let summary_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let summary_path = summary_dir.join("summary.csv");
        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed = results.len() - succeeded;
    println!(
        "{} Processed {} files ({} ok, {} failed) in {:.1}s",
        style("✓").green(),
        results.len(),
        succeeded,
        failed,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn process_file(pipeline: &ReceiptPipeline, path: PathBuf, options: &ExtractOptions) -> FileResult {
    let start = Instant::now();
    let outcome = fs::read(&path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| pipeline.extract_bytes(&bytes, options).map_err(|e| e.to_string()));
    let processing_time_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(result) => FileResult {
            path,
            result: Some(result),
            error: None,
            processing_time_ms,
        },
        Err(error) => FileResult {
            path,
            result: None,
            error: Some(error),
            processing_time_ms,
        },
    }
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "items",
        "confidence",
        "quality_score",
        "anomalies",
        "processing_time_ms",
        "error",
    ])?;

    for file_result in results {
        let filename = file_result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        if let Some(result) = &file_result.result {
            let anomalies: Vec<&str> = result.anomalies.iter().map(|a| a.kind.as_str()).collect();
            wtr.write_record([
                filename,
                "success",
                &result.items.len().to_string(),
                &format!("{:.2}", result.confidence),
                &format!("{:.2}", result.quality_score),
                &anomalies.join(";"),
                &file_result.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                &file_result.processing_time_ms.to_string(),
                file_result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
