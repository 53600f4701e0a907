use std::path::Path;

use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::models::{Severity, SourcedDiagnostic};

/// Render a colored terminal report of the diagnostics found in
/// `record_count` records.
pub fn render(
    diagnostics: &[SourcedDiagnostic],
    record_count: usize,
    path: &Path,
    verbose: bool,
    quiet: bool,
) {
    let critical_count = count(diagnostics, Severity::Critical);
    let info_count = count(diagnostics, Severity::Info);

    if quiet {
        println!(
            "Records: {}  Critical: {}  Info: {}",
            record_count,
            critical_count.to_string().red(),
            info_count.to_string().cyan(),
        );
        return;
    }

    println!(
        "\n {} v{}",
        "about-attrib".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Checking: {}\n", path.display());

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Records            : {}", record_count));
    println!(
        " │  {:<48} │",
        format!("{}  Critical         : {:>4}", "✗".red(), critical_count)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Info             : {:>4}", "ℹ".cyan(), info_count)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    if critical_count > 0 {
        println!(" {} Records requiring attention:\n", "[CRITICAL]".red().bold());
        render_table(diagnostics, Severity::Critical);
        println!();
    }

    if verbose && info_count > 0 {
        println!(" {} Informational findings:\n", "[INFO]".cyan().bold());
        render_table(diagnostics, Severity::Info);
        println!();
    }
}

fn count(diagnostics: &[SourcedDiagnostic], severity: Severity) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.diagnostic.severity == severity)
        .count()
}

fn render_table(diagnostics: &[SourcedDiagnostic], severity: Severity) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Record").add_attribute(Attribute::Bold),
            Cell::new("Severity").add_attribute(Attribute::Bold),
            Cell::new("Message").add_attribute(Attribute::Bold),
        ]);

    let color = match severity {
        Severity::Critical => Color::Red,
        Severity::Info => Color::Cyan,
    };

    for sourced in diagnostics.iter().filter(|d| d.diagnostic.severity == severity) {
        table.add_row(vec![
            Cell::new(&sourced.source),
            Cell::new(severity.to_string())
                .fg(color)
                .set_alignment(CellAlignment::Center),
            Cell::new(&sourced.diagnostic.message),
        ]);
    }

    println!("{}", table);
}
