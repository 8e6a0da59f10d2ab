use crate::OutputFormat;
use anyhow::{Context, Result};
use harcap_core::har::{Har, HarReader};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct HarSummary {
    pub version: String,
    pub creator: String,
    pub pages: Vec<PageSummary>,
    pub entries: usize,
    /// Entries whose response never arrived
    pub failed: usize,
    /// Sum of entry times in milliseconds
    pub total_time: i64,
}

#[derive(Debug, Serialize)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub entries: usize,
    pub on_load: f64,
}

pub fn summarize(har: &Har) -> HarSummary {
    let pages = har
        .log
        .pages
        .iter()
        .map(|page| PageSummary {
            id: page.id.clone(),
            title: page.title.clone(),
            entries: har
                .log
                .entries
                .iter()
                .filter(|e| e.page_ref == page.id)
                .count(),
            on_load: page.page_timings.on_load,
        })
        .collect();

    HarSummary {
        version: har.log.version.clone(),
        creator: format!("{} {}", har.log.creator.name, har.log.creator.version),
        pages,
        entries: har.log.entries.len(),
        failed: har
            .log
            .entries
            .iter()
            .filter(|e| e.response.error_message.is_some())
            .count(),
        total_time: har.log.entries.iter().map(|e| e.time).sum(),
    }
}

/// Validate a HAR file and print what it holds
pub fn execute(file: &Path, format: OutputFormat) -> Result<()> {
    tracing::info!("Inspecting HAR file: {}", file.display());

    let har = HarReader::from_file(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    HarReader::validate(&har)?;

    let summary = summarize(&har);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Pretty => output_pretty(&summary),
    }

    Ok(())
}

fn output_pretty(summary: &HarSummary) {
    use console::style;

    println!("\n{}", style("HAR Summary").bold().cyan());
    println!("{}", style("===========").cyan());
    println!("  Version:     {}", summary.version);
    println!("  Creator:     {}", summary.creator);
    println!("  Entries:     {}", summary.entries);
    println!("  No response: {}", summary.failed);
    println!("  Total time:  {} ms", summary.total_time);

    if !summary.pages.is_empty() {
        println!("\n{}", style("Pages:").bold());
        for page in &summary.pages {
            println!(
                "  {} ({}) - {} entries, onLoad {:.0} ms",
                page.id, page.title, page.entries, page.on_load
            );
        }
    }

    println!();
}
