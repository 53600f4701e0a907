//! Attribution document generation.
//!
//! [`Aggregator`] merges the license data of many records into deduplicated
//! maps and hands them, with the records, to a [`TemplateRenderer`]. Records
//! are processed in input order, which decides which of several identically
//! named license files wins.

pub mod template;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::RenderError;
use crate::license::expression;
use crate::license::mapping::COMMON_LICENSES;
use crate::license::reference::LICENSE_FILE_SUFFIX;
use crate::models::Diagnostic;
use crate::record::MetadataRecord;

pub use template::{AttributionContext, JinjaRenderer, TemplateRenderer, DEFAULT_TEMPLATE};

/// How a license key is derived from the name of a license text file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDerivation {
    /// Remove exactly one trailing `.LICENSE`.
    #[default]
    Exact,
    /// Historical behavior: strip every leading and trailing character that
    /// appears in `.LICENSE`. `LGPL.LICENSE` becomes `GP`.
    Legacy,
}

impl KeyDerivation {
    pub fn license_key(self, file_name: &str) -> String {
        if !file_name.ends_with(LICENSE_FILE_SUFFIX) {
            return file_name.to_string();
        }
        match self {
            KeyDerivation::Exact => file_name
                .strip_suffix(LICENSE_FILE_SUFFIX)
                .unwrap_or(file_name)
                .to_string(),
            KeyDerivation::Legacy => file_name
                .trim_matches(|c| LICENSE_FILE_SUFFIX.contains(c))
                .to_string(),
        }
    }
}

/// License maps shared by all records of one attribution run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LicenseIndex {
    /// License key → license text, sorted by key.
    pub license_key_and_context: BTreeMap<String, String>,
    pub license_file_name_and_key: IndexMap<String, String>,
    pub license_key_to_license_name: IndexMap<String, String>,
    pub license_name_to_license_key: IndexMap<String, String>,
}

pub struct Aggregator<R = JinjaRenderer> {
    renderer: R,
    key_derivation: KeyDerivation,
}

impl Aggregator<JinjaRenderer> {
    pub fn new() -> Self {
        Self::with_renderer(JinjaRenderer::new())
    }
}

impl Default for Aggregator<JinjaRenderer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: TemplateRenderer> Aggregator<R> {
    pub fn with_renderer(renderer: R) -> Self {
        Self {
            renderer,
            key_derivation: KeyDerivation::default(),
        }
    }

    pub fn key_derivation(mut self, key_derivation: KeyDerivation) -> Self {
        self.key_derivation = key_derivation;
        self
    }

    /// Build the shared license maps and set each record's
    /// `license_name_expression`.
    ///
    /// License texts are deduplicated by file name, first record wins. Key to
    /// name pairs come from records listing `license_name` next to their
    /// expression; once all pairs are known, every record with an expression
    /// gets its display form.
    pub fn collect(&self, records: &mut [MetadataRecord]) -> Result<LicenseIndex, RenderError> {
        let mut index = LicenseIndex::default();

        for record in records.iter() {
            for (file_name, text) in record.license_file_texts() {
                if index.license_file_name_and_key.contains_key(&file_name) {
                    continue;
                }
                let key = self.key_derivation.license_key(&file_name);
                index.license_key_and_context.insert(key.clone(), text);
                index.license_file_name_and_key.insert(file_name, key);
            }

            let Some(expr) = record.license_expression.as_deref() else {
                continue;
            };
            if record.license_name.is_empty() {
                continue;
            }
            let resolution = expression::resolve(expr).map_err(|e| RenderError::Runtime {
                line: None,
                message: format!("invalid license_expression {expr:?}: {e}"),
            })?;
            if !resolution.is_valid() {
                continue;
            }
            for (key, name) in expression::pair_key_names(expr, &resolution.keys, &record.license_name)? {
                index.license_key_to_license_name.insert(key.clone(), name.clone());
                index.license_name_to_license_key.insert(name, key);
            }
        }

        for record in records.iter_mut() {
            if let Some(expr) = record.license_expression.as_deref() {
                let named = expression::replace_keys(expr, &index.license_key_to_license_name);
                record.license_name_expression = Some(named);
            }
        }

        debug!(
            records = records.len(),
            license_texts = index.license_key_and_context.len(),
            license_names = index.license_key_to_license_name.len(),
            "collected attribution data"
        );
        Ok(index)
    }

    /// Render `template` over `records`.
    pub fn render(
        &self,
        records: &mut [MetadataRecord],
        template: &str,
        vartext: &IndexMap<String, String>,
    ) -> Result<String, RenderError> {
        self.renderer.check(template)?;

        let index = self.collect(records)?;
        let context = AttributionContext {
            abouts: records,
            common_licenses: COMMON_LICENSES,
            license_key_and_context: &index.license_key_and_context,
            license_file_name_and_key: &index.license_file_name_and_key,
            license_key_to_license_name: &index.license_key_to_license_name,
            license_name_to_license_key: &index.license_name_to_license_key,
            utcnow: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            vartext_dict: vartext,
        };
        self.renderer.render(template, &context)
    }

    /// Render with the template at `template_path` (or the bundled default)
    /// and write the result to `output`.
    ///
    /// A render failure is written in place of the document and returned.
    pub fn render_to_file(
        &self,
        records: &mut [MetadataRecord],
        output: &Path,
        template_path: Option<&Path>,
        vartext: &IndexMap<String, String>,
    ) -> Result<Option<RenderError>> {
        let template = match template_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read template {}", path.display()))?,
            None => DEFAULT_TEMPLATE.to_string(),
        };

        let (content, failure) = match self.render(records, &template, vartext) {
            Ok(rendered) => (rendered, None),
            Err(e) => (e.to_string(), Some(e)),
        };

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(output, content)
            .with_context(|| format!("Failed to write attribution to {}", output.display()))?;
        Ok(failure)
    }

    /// Check every record's expression, then render to `output`.
    ///
    /// Returns one CRITICAL diagnostic per record whose expression holds
    /// unsupported characters, plus one for a render failure.
    pub fn generate_and_save(
        &self,
        records: &mut [MetadataRecord],
        output: &Path,
        template_path: Option<&Path>,
        vartext: &IndexMap<String, String>,
    ) -> Result<Vec<Diagnostic>> {
        let mut errors = Vec::new();
        for record in records.iter() {
            let Some(expr) = record.license_expression.as_deref() else {
                continue;
            };
            let disallowed = expression::detect_disallowed(expr);
            if !disallowed.is_empty() {
                let chars: Vec<String> = disallowed.iter().map(|c| c.to_string()).collect();
                errors.push(Diagnostic::critical(format!(
                    "The following character(s) cannot be in the license_expression: {}",
                    chars.join(" ")
                )));
            }
        }

        if let Some(failure) = self.render_to_file(records, output, template_path, vartext)? {
            errors.push(Diagnostic::critical(failure.to_string()));
        }
        Ok(errors)
    }
}

/// Parse `key=value` entries. The first `=` splits; a missing `=` means an
/// empty value.
pub fn parse_vartext<S: AsRef<str>>(entries: &[S]) -> IndexMap<String, String> {
    entries
        .iter()
        .map(|entry| {
            let entry = entry.as_ref();
            let (key, value) = entry.split_once('=').unwrap_or((entry, ""));
            (key.to_string(), value.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::license::reference::LicenseReference;

    fn record_with_text(about: &str, file: &str, text: &str) -> MetadataRecord {
        let mut record = MetadataRecord::parse(&format!("about_resource: {about}\n"));
        let key = file.strip_suffix(".LICENSE").unwrap_or(file);
        let mut license = LicenseReference::new(key);
        license.file = file.to_string();
        license.text = Some(text.to_string());
        record.licenses.push(license);
        record
    }

    #[test]
    fn test_key_derivation() {
        assert_eq!(KeyDerivation::Exact.license_key("MIT.LICENSE"), "MIT");
        assert_eq!(KeyDerivation::Legacy.license_key("MIT.LICENSE"), "MIT");
        assert_eq!(KeyDerivation::Exact.license_key("LGPL.LICENSE"), "LGPL");
        assert_eq!(KeyDerivation::Legacy.license_key("LGPL.LICENSE"), "GP");
        assert_eq!(KeyDerivation::Exact.license_key("COPYING"), "COPYING");
        assert_eq!(KeyDerivation::Legacy.license_key("COPYING"), "COPYING");
    }

    #[test]
    fn test_license_texts_first_wins() {
        let mut records = vec![
            record_with_text("a", "MIT.LICENSE", "first MIT text"),
            record_with_text("b", "MIT.LICENSE", "second MIT text"),
            record_with_text("c", "apache-2.0.LICENSE", "Apache text"),
        ];
        let index = Aggregator::new().collect(&mut records).unwrap();

        assert_eq!(index.license_key_and_context.len(), 2);
        assert_eq!(index.license_key_and_context["MIT"], "first MIT text");
        assert_eq!(
            index.license_key_and_context.keys().collect::<Vec<_>>(),
            vec!["MIT", "apache-2.0"]
        );
        assert_eq!(index.license_file_name_and_key["MIT.LICENSE"], "MIT");
    }

    #[test]
    fn test_empty_license_text_does_not_block_later_text() {
        let mut records = vec![
            record_with_text("a", "MIT.LICENSE", ""),
            record_with_text("b", "MIT.LICENSE", "MIT text"),
        ];
        let index = Aggregator::new().collect(&mut records).unwrap();
        assert_eq!(index.license_key_and_context["MIT"], "MIT text");
    }

    #[test]
    fn test_disallowed_expression_skipped_for_names() {
        let mut bad = MetadataRecord::parse("about_resource: .\n");
        bad.license_expression = Some("mit/isc".to_string());
        bad.license_name = vec!["MIT License".to_string()];
        let mut records = vec![bad];

        let index = Aggregator::new().collect(&mut records).unwrap();
        assert!(index.license_key_to_license_name.is_empty());
        assert!(index.license_name_to_license_key.is_empty());
        assert_eq!(records[0].license_name_expression.as_deref(), Some("mit/isc"));
    }

    #[test]
    fn test_key_name_maps_are_inverse() {
        let mut records = vec![MetadataRecord::parse(
            "about_resource: .\n\
             license_expression: (mit OR isc) AND zlib\n\
             license_name: [MIT License, ISC License, Zlib License]\n",
        )];
        let index = Aggregator::new().collect(&mut records).unwrap();

        assert_eq!(index.license_key_to_license_name.len(), 3);
        for (key, name) in &index.license_key_to_license_name {
            assert_eq!(&index.license_name_to_license_key[name], key);
        }
        for (name, key) in &index.license_name_to_license_key {
            assert_eq!(&index.license_key_to_license_name[key], name);
        }
        assert_eq!(
            records[0].license_name_expression.as_deref(),
            Some("(MIT License OR ISC License) AND Zlib License")
        );
    }

    #[test]
    fn test_mismatched_name_list() {
        let mut records = vec![MetadataRecord::parse(
            "about_resource: .\nlicense_expression: mit OR isc\nlicense_name: MIT License\n",
        )];
        let err = Aggregator::new().collect(&mut records).unwrap_err();
        match err {
            RenderError::MismatchedNames(e) => {
                assert_eq!(e.keys, 2);
                assert_eq!(e.names, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_end_to_end_name_expression() {
        let mut records = vec![
            MetadataRecord::parse(
                "about_resource: a\nlicense_expression: mit\nlicense_name: MIT License\n",
            ),
            MetadataRecord::parse("about_resource: b\nlicense_expression: mit\n"),
        ];
        let out = Aggregator::new()
            .render(
                &mut records,
                "{% for about in abouts %}{{ about.license_name_expression }};{% endfor %}",
                &IndexMap::new(),
            )
            .unwrap();
        assert_eq!(out, "MIT License;MIT License;");
        assert!(records
            .iter()
            .all(|r| r.license_name_expression.as_deref() == Some("MIT License")));
    }

    #[test]
    fn test_render_syntax_error_checked_first() {
        let mut records = vec![MetadataRecord::parse(
            "about_resource: .\nlicense_expression: mit OR isc\nlicense_name: MIT License\n",
        )];
        let err = Aggregator::new()
            .render(&mut records, "{% for about in abouts %}", &IndexMap::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::Syntax { .. }));
        assert!(err.to_string().starts_with("Template validation error at line: "));
        assert_eq!(records[0].license_name_expression, None);
    }

    #[test]
    fn test_render_exposes_maps_and_vartext() {
        let mut records = vec![record_with_text("a", "mit.LICENSE", "MIT text")];
        let vartext = parse_vartext(&["product=Acme Box"]);
        let out = Aggregator::new()
            .render(
                &mut records,
                "{{ vartext_dict.product }}|{% for k, v in license_key_and_context|items %}{{ k }}={{ v }}{% endfor %}|{{ license_file_name_and_key['mit.LICENSE'] }}",
                &vartext,
            )
            .unwrap();
        assert_eq!(out, "Acme Box|mit=MIT text|mit");
    }

    #[test]
    fn test_default_template_renders() {
        let mut records = vec![
            MetadataRecord::parse(
                "about_resource: zlib\nname: zlib\nversion: 1.2.11\ncopyright: Copyright <Jean-loup>\n\
                 license_expression: zlib\nlicense_name: Zlib License\n",
            ),
            record_with_text("b", "mit.LICENSE", "MIT text"),
        ];
        records[0].licenses[0].text = Some("zlib text".to_string());

        let out = Aggregator::new()
            .render(&mut records, DEFAULT_TEMPLATE, &IndexMap::new())
            .unwrap();
        assert!(out.contains("This component is licensed under Zlib License"));
        assert!(out.contains("Copyright &lt;Jean-loup&gt;"));
        assert!(out.contains("<h3 id=\"zlib\">Zlib License</h3>"));
        assert!(out.contains("<h3 id=\"mit\">mit</h3>"));
    }

    #[test]
    fn test_render_to_file_writes_error_text() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("broken.template");
        std::fs::write(&template, "{% if %}").unwrap();
        let output = dir.path().join("out").join("attribution.html");

        let failure = Aggregator::new()
            .render_to_file(&mut [], &output, Some(&template), &IndexMap::new())
            .unwrap();
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(failure.is_some());
        assert!(written.starts_with("Template validation error at line: 1"));
    }

    #[test]
    fn test_generate_and_save_reports_disallowed_characters() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("attribution.html");
        let mut bad = MetadataRecord::parse("about_resource: .\n");
        bad.license_expression = Some("mit/isc".to_string());
        bad.license_name = vec!["MIT License".to_string()];
        let mut records = vec![bad, MetadataRecord::parse("about_resource: .\nlicense_expression: mit\n")];

        let errors = Aggregator::new()
            .generate_and_save(&mut records, &output, None, &IndexMap::new())
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.ends_with(": /"));
        assert_eq!(records[1].license_name_expression.as_deref(), Some("mit"));
        assert!(std::fs::read_to_string(&output).unwrap().contains("<html>"));
    }

    #[test]
    fn test_parse_vartext() {
        let vars = parse_vartext(&["title=Notices", "empty=", "bare", "eq=a=b"]);
        assert_eq!(vars["title"], "Notices");
        assert_eq!(vars["empty"], "");
        assert_eq!(vars["bare"], "");
        assert_eq!(vars["eq"], "a=b");
    }
}
