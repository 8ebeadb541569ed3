//! Extract command - extract line items from a single receipt.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use rcpt_core::models::receipt::{ExtractionResult, ReceiptItem};
use rcpt_core::{ExtractOptions, Locale};

use super::{build_pipeline, load_config};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input text file (`-` for stdin)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Vendor hint, e.g. "a-mart"
    #[arg(long)]
    vendor: Option<String>,

    /// Attach a diagnostic report
    #[arg(long)]
    debug: bool,

    /// Document confidence floor (0.0 - 1.0)
    #[arg(long)]
    floor: Option<f32>,

    /// Locale hint, e.g. "ja", "en", "de"
    #[arg(long)]
    locale: Option<String>,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per item
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let pipeline = build_pipeline(&config)?;

    let bytes = if args.input.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        if !args.input.exists() {
            anyhow::bail!("Input file not found: {}", args.input.display());
        }
        fs::read(&args.input)?
    };

    info!("Extracting items from {}", args.input.display());

    let options = build_options(
        args.vendor.clone(),
        args.debug,
        args.floor,
        args.locale.as_deref(),
    );
    let result = pipeline.extract_bytes(&bytes, &options)?;

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        println!();
        println!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            result.confidence * 100.0
        );
        println!(
            "{} Quality score: {:.1}%",
            style("ℹ").blue(),
            result.quality_score * 100.0
        );
    }

    Ok(())
}

/// Request options from command-line flags.
pub fn build_options(
    vendor: Option<String>,
    debug: bool,
    floor: Option<f32>,
    locale: Option<&str>,
) -> ExtractOptions {
    ExtractOptions {
        vendor_hint: vendor,
        debug_mode: debug,
        confidence_floor: floor,
        locale: locale.map(Locale::from_hint),
    }
}

/// Render a result in the requested format.
pub fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_items_csv(&result.items),
        OutputFormat::Text => Ok(format_result_text(result)),
    }
}

fn format_items_csv(items: &[ReceiptItem]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "line",
        "name",
        "unit_price",
        "quantity",
        "subtotal",
        "category",
        "expiry",
        "confidence",
        "stage",
        "pattern",
        "corrected",
    ])?;

    for item in items {
        let corrected: Vec<&str> = item.corrected_fields.iter().map(|f| f.as_str()).collect();

        wtr.write_record([
            item.line_index.to_string().as_str(),
            item.name.as_deref().unwrap_or(""),
            &item.unit_price.map(|d| d.to_string()).unwrap_or_default(),
            &item.quantity.map(|d| d.to_string()).unwrap_or_default(),
            &item.subtotal.map(|d| d.to_string()).unwrap_or_default(),
            item.category_hint.as_deref().unwrap_or(""),
            item.expiry_hint.as_ref().map(|h| h.raw.as_str()).unwrap_or(""),
            &format!("{:.2}", item.confidence),
            item.stage.as_str(),
            &item.pattern_id,
            &corrected.join(";"),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_result_text(result: &ExtractionResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Items: {}\n", result.items.len()));
    output.push('\n');

    for item in &result.items {
        let name = item.name.as_deref().unwrap_or("?");
        let price = item.unit_price.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
        output.push_str(&format!("  [{:>3}] {}", item.line_index, name));
        match item.quantity {
            Some(qty) => output.push_str(&format!("  {} x {}", qty, price)),
            None => output.push_str(&format!("  {}", price)),
        }
        if let Some(subtotal) = item.subtotal {
            output.push_str(&format!(" = {}", subtotal));
        }
        output.push_str(&format!("  ({}, {:.2})\n", item.stage, item.confidence));
    }

    output.push('\n');
    output.push_str(&format!("Confidence: {:.2}\n", result.confidence));
    output.push_str(&format!("Quality:    {:.2}\n", result.quality_score));

    if !result.anomalies.is_empty() {
        output.push_str("\nAnomalies:\n");
        for anomaly in &result.anomalies {
            match anomaly.line_index {
                Some(line) => output.push_str(&format!(
                    "  - line {}: {} ({})\n",
                    line, anomaly.kind, anomaly.message
                )),
                None => output.push_str(&format!("  - {} ({})\n", anomaly.kind, anomaly.message)),
            }
        }
    }

    if let Some(report) = &result.debug {
        if !report.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in &report.suggestions {
                output.push_str(&format!("  - {}\n", suggestion));
            }
        }
    }

    output
}
