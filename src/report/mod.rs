//! Report renderers for inventory check results.
//!
//! - [`terminal`]: colored, tabular output with summary box; respects `--verbose` / `--quiet`.
//!
//! JSON output is a plain `serde_json` dump of [`collect_diagnostics`].

pub mod terminal;

use crate::models::SourcedDiagnostic;
use crate::record::MetadataRecord;

/// Name shown for a record in reports: its file, else its resource.
pub fn record_source(record: &MetadataRecord) -> String {
    match (&record.location, &record.about_resource) {
        (Some(location), _) => location.display().to_string(),
        (None, Some(resource)) => resource.clone(),
        (None, None) => "<unknown>".to_string(),
    }
}

/// Flatten every record's errors, in record order.
pub fn collect_diagnostics(records: &[MetadataRecord]) -> Vec<SourcedDiagnostic> {
    records
        .iter()
        .flat_map(|record| {
            let source = record_source(record);
            record.errors.iter().map(move |diagnostic| SourcedDiagnostic {
                source: source.clone(),
                diagnostic: diagnostic.clone(),
            })
        })
        .collect()
}
