//! Patterns command - inspect the pattern library.

use clap::Args;
use console::style;
use serde::Serialize;

use rcpt_core::receipt::library::{ConfidenceClass, Pattern, PatternField};

use super::{build_pipeline, load_config};

/// Arguments for the patterns command.
#[derive(Args)]
pub struct PatternsArgs {
    /// Show the patterns tried for this vendor, in lookup order
    #[arg(long)]
    vendor: Option<String>,

    /// Print patterns as JSON
    #[arg(long)]
    json: bool,

    /// Include the regex source
    #[arg(long)]
    show_regex: bool,
}

#[derive(Serialize)]
struct PatternSummary<'a> {
    id: &'a str,
    vendor: Option<&'a str>,
    class: ConfidenceClass,
    ceiling: f32,
    fields: &'a [PatternField],
    #[serde(skip_serializing_if = "Option::is_none")]
    regex: Option<&'a str>,
}

impl<'a> PatternSummary<'a> {
    fn new(pattern: &'a Pattern, show_regex: bool) -> Self {
        Self {
            id: pattern.id(),
            vendor: pattern.vendor(),
            class: pattern.class(),
            ceiling: pattern.class().ceiling(),
            fields: pattern.fields(),
            regex: show_regex.then(|| pattern.source()),
        }
    }
}

pub async fn run(args: PatternsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let pipeline = build_pipeline(&config)?;
    let library = pipeline.library();

    let patterns = library.lookup(args.vendor.as_deref());
    let summaries: Vec<PatternSummary> = patterns
        .iter()
        .map(|p| PatternSummary::new(p, args.show_regex))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!(
        "{} Pattern library {} ({} patterns, vendors: {})",
        style("ℹ").blue(),
        library.version(),
        library.len(),
        library.vendors().join(", ")
    );

    if let Some(vendor) = &args.vendor {
        if !library.has_vendor(vendor) {
            println!(
                "{} No patterns for vendor '{}'; only generic patterns apply.",
                style("!").yellow(),
                vendor
            );
        }
    }

    println!();
    for summary in &summaries {
        let fields: Vec<&str> = summary.fields.iter().map(|f| f.capture_name()).collect();
        println!(
            "  {:<36} {:<9} {:<10} {}",
            summary.id,
            format!("{:?}", summary.class).to_lowercase(),
            summary.vendor.unwrap_or("generic"),
            fields.join(",")
        );
        if let Some(regex) = summary.regex {
            println!("      {}", style(regex).dim());
        }
    }

    Ok(())
}
