//! `about-attrib`: validate ABOUT provenance records and render attribution.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load config ([`config::load_config`]).
//! 3. Load every `.ABOUT` file under the given path ([`inventory`]).
//! 4. Run the subcommand: `check` reports diagnostics, `attrib` renders a
//!    document, `translate` rewrites license identifiers.
//! 5. Exit `0` (clean) or `1` (at least one CRITICAL diagnostic).

mod cli;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use about_attrib::attrib::{parse_vartext, Aggregator};
use about_attrib::config::load_config;
use about_attrib::inventory::load_inventory;
use about_attrib::license::mapping::{Direction, LicenseMapping};
use about_attrib::license::reference::load_license_references;
use about_attrib::models::{Diagnostic, SourcedDiagnostic};
use about_attrib::record::MetadataRecord;
use about_attrib::report;
use cli::{Cli, Command, ReportFormat};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let failed = match &cli.command {
        Command::Check {
            path,
            report,
            verbose,
        } => run_check(path, report, *verbose, cli.quiet)?,
        Command::Attrib {
            path,
            output,
            template,
            vartext,
            reference,
        } => run_attrib(
            &cli,
            path,
            output,
            template.as_deref(),
            vartext,
            reference.as_deref(),
        )?,
        Command::Translate {
            path,
            output_dir,
            reverse,
            mapping,
        } => run_translate(path, output_dir, *reverse, mapping.as_deref(), cli.quiet)?,
    };

    if failed {
        std::process::exit(1);
    }

    Ok(())
}

fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn spinner(quiet: bool, message: &str) -> Result<Option<ProgressBar>> {
    if quiet {
        return Ok(None);
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(Some(pb))
}

fn load_records(path: &Path, quiet: bool) -> Result<Vec<MetadataRecord>> {
    let pb = spinner(quiet, &format!("Loading ABOUT files from {}", path.display()))?;
    let records = load_inventory(path)?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    if !quiet {
        eprintln!(
            "  {} {} ABOUT file(s)",
            "→".cyan(),
            records.len()
        );
    }
    Ok(records)
}

fn print_diagnostics(source: &str, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let severity = if diagnostic.is_critical() {
            diagnostic.severity.to_string().red().bold()
        } else {
            diagnostic.severity.to_string().cyan().bold()
        };
        eprintln!("  {} {}: {}", severity, source, diagnostic.message);
    }
}

fn run_check(path: &Path, format: &ReportFormat, verbose: bool, quiet: bool) -> Result<bool> {
    let path = resolve(path);
    let mut records = load_records(&path, quiet || matches!(format, ReportFormat::Json))?;

    for record in &mut records {
        record.check_files(None);
    }

    let diagnostics: Vec<SourcedDiagnostic> = report::collect_diagnostics(&records);
    match format {
        ReportFormat::Terminal => {
            report::terminal::render(&diagnostics, records.len(), &path, verbose, quiet);
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        }
    }

    Ok(diagnostics.iter().any(|d| d.diagnostic.is_critical()))
}

fn run_attrib(
    cli: &Cli,
    path: &Path,
    output: &Path,
    template: Option<&Path>,
    vartext: &[String],
    reference: Option<&Path>,
) -> Result<bool> {
    let path = resolve(path);
    let config = load_config(&path, cli.config.as_deref())?;
    let attribution = &config.attribution;

    let mut records = load_records(&path, cli.quiet)?;
    let mut failed = false;

    if let Some(reference_dir) = reference.or(attribution.reference_dir.as_deref()) {
        let library = load_license_references(reference_dir)?;
        print_diagnostics(&reference_dir.display().to_string(), &library.errors);
        failed |= library.errors.iter().any(Diagnostic::is_critical);
        for record in &mut records {
            record
                .apply_references(&library)
                .with_context(|| format!("Failed to apply references to {}", report::record_source(record)))?;
        }
    }

    // Texts already supplied by the reference library are not read again.
    for record in &mut records {
        record.load_files(None);
    }
    for sourced in report::collect_diagnostics(&records) {
        if sourced.diagnostic.is_critical() {
            print_diagnostics(&sourced.source, std::slice::from_ref(&sourced.diagnostic));
            failed = true;
        }
    }

    let vartext = config.merged_vartext(&parse_vartext(vartext));
    let template = template.or(attribution.template.as_deref());
    debug!(template = ?template, vars = vartext.len(), "rendering attribution");

    let aggregator = Aggregator::new().key_derivation(attribution.key_derivation);
    let errors = aggregator.generate_and_save(&mut records, output, template, &vartext)?;
    print_diagnostics(&output.display().to_string(), &errors);

    failed |= errors.iter().any(Diagnostic::is_critical);
    if !cli.quiet && !failed {
        eprintln!(
            "  {} Attribution written to {}",
            "✓".green(),
            output.display()
        );
    }
    Ok(failed)
}

fn run_translate(
    path: &Path,
    output_dir: &Path,
    reverse: bool,
    mapping: Option<&Path>,
    quiet: bool,
) -> Result<bool> {
    let path = resolve(path);
    let mapping = match mapping {
        Some(mapping) => LicenseMapping::load(mapping)?,
        None => LicenseMapping::bundled()?,
    };
    let direction = if reverse {
        Direction::SpdxToKey
    } else {
        Direction::KeyToSpdx
    };

    let root = if path.is_file() {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        path.clone()
    };

    let mut records = load_records(&path, quiet)?;
    let mut failed = false;
    for record in &mut records {
        let source = report::record_source(record);
        if record.has_critical_errors() {
            print_diagnostics(&source, &record.errors);
            failed = true;
            continue;
        }
        if let Err(e) = mapping.translate_record(record, direction) {
            print_diagnostics(&source, &[Diagnostic::critical(e.to_string())]);
            failed = true;
            continue;
        }

        let Some(location) = &record.location else {
            continue;
        };
        let relative = match location.strip_prefix(&root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => location.file_name().map(PathBuf::from).unwrap_or_default(),
        };
        record.write(&output_dir.join(relative), false)?;
    }

    if !quiet {
        eprintln!(
            "  {} Translated records written to {}",
            "✓".green(),
            output_dir.display()
        );
    }
    Ok(failed)
}
