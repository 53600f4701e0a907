//! The ABOUT metadata record: one component's provenance and license terms.
//!
//! - [`schema`]: ordered field declarations driving parse and serialize.
//! - [`convert`]: per-field value converters.
//!
//! A record is always produced, even from garbage input; every problem is
//! reported through [`MetadataRecord::errors`].

pub mod convert;
pub mod schema;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::LicenseError;
use crate::license::expression;
use crate::license::reference::{LicenseDefinition, LicenseReference, ReferenceLibrary};
use crate::models::Diagnostic;

use convert::Flag;
use schema::{FieldKind, FLAG_VALIDATION_ORDER, RESERVED_FIELDS, STANDARD_FIELDS};

static VALID_FIELD_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("field name pattern is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataRecord {
    /// File this record was loaded from, if any.
    #[serde(skip)]
    pub location: Option<PathBuf>,

    /// Path of the described resource relative to the record's directory.
    pub about_resource: Option<String>,

    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub download_url: Option<String>,
    pub notes: Option<String>,

    pub copyright: Option<String>,
    pub license_expression: Option<String>,

    pub attribute: Option<Flag>,
    pub redistribute: Option<Flag>,
    pub modified: Option<Flag>,
    pub track_changes: Option<Flag>,
    pub internal_use_only: Option<Flag>,

    pub licenses: Vec<LicenseReference>,
    /// Display names, parallel to the keys of `license_expression`.
    pub license_name: Vec<String>,

    pub notice_file: Option<String>,
    pub notice_text: Option<String>,
    pub notice_url: Option<String>,
    pub changelog_file: Option<String>,

    pub owner: Option<String>,
    pub owner_url: Option<String>,

    pub vcs_tool: Option<String>,
    pub vcs_repository: Option<String>,
    pub vcs_revision: Option<String>,

    pub checksum_md5: Option<String>,
    pub checksum_sha1: Option<String>,
    pub checksum_sha256: Option<String>,
    pub spec_version: Option<String>,

    /// `license_expression` with keys replaced by display names; set while
    /// generating attribution.
    pub license_name_expression: Option<String>,

    #[serde(flatten)]
    pub custom_fields: IndexMap<String, String>,

    pub errors: Vec<Diagnostic>,
}

impl MetadataRecord {
    /// Parse a record from YAML text.
    ///
    /// Never fails: malformed input yields an otherwise empty record carrying
    /// a single CRITICAL error.
    pub fn parse(text: &str) -> Self {
        match Self::try_parse(text) {
            Ok(record) => record,
            Err(e) => Self::degenerate(format!(
                "Cannot load invalid ABOUT file from: {text:?}: {e:?}"
            )),
        }
    }

    /// Load and parse the record stored at `location`.
    pub fn load(location: &Path) -> Self {
        let mut record = match std::fs::read_to_string(location) {
            Ok(text) => Self::parse(&text),
            Err(e) => Self::degenerate(format!(
                "Cannot load invalid ABOUT file from: {:?}: {e}",
                location.display().to_string()
            )),
        };
        record.location = Some(location.to_path_buf());
        record
    }

    fn degenerate(message: String) -> Self {
        Self {
            errors: vec![Diagnostic::critical(message)],
            ..Self::default()
        }
    }

    fn try_parse(text: &str) -> Result<Self> {
        let data = match serde_yaml::from_str::<Value>(text).context("Invalid YAML")? {
            Value::Mapping(mapping) => mapping,
            Value::Null => Mapping::new(),
            other => bail!("Invalid data: expected a mapping, found {other:?}"),
        };
        Self::from_mapping(data)
    }

    /// Build a record from an already decoded mapping and validate it.
    pub fn from_mapping(data: Mapping) -> Result<Self> {
        let mut entries = Vec::with_capacity(data.len());
        for (key, value) in data {
            let key = match key {
                Value::String(key) => key,
                other => bail!("Invalid data: field names must be strings, found {other:?}"),
            };
            entries.push((key, value));
        }

        let lowered: HashSet<String> = entries.iter().map(|(k, _)| k.to_lowercase()).collect();
        if lowered.len() != entries.len() {
            bail!("Invalid data: lowercased keys must be unique.");
        }
        if entries.iter().any(|(k, _)| *k != k.to_lowercase()) {
            bail!("Invalid data: all keys must be lowercase.");
        }
        if let Some((key, _)) = entries.iter().find(|(k, _)| RESERVED_FIELDS.contains(&k.as_str())) {
            bail!("Invalid data: {key:?} is a reserved field name.");
        }

        let mut record = Self::default();
        for (key, value) in entries {
            record
                .set_field(&key, &value)
                .with_context(|| format!("Invalid value for field {key:?}"))?;
        }

        if record.licenses.is_empty() {
            if let Some(expr) = &record.license_expression {
                let keys = expression::parse(expr)?.keys();
                record.licenses = keys.into_iter().map(LicenseReference::new).collect();
            }
        }

        record.validate();
        Ok(record)
    }

    fn set_field(&mut self, key: &str, value: &Value) -> Result<()> {
        let Some(spec) = schema::lookup(key) else {
            if let Some(text) = convert::scalar_to_string(value) {
                self.custom_fields.insert(key.to_string(), text);
            }
            return Ok(());
        };

        match spec.kind {
            FieldKind::Flag => {
                if let (Some(slot), Some(flag)) = (self.flag_mut(key), convert::flag(value)) {
                    *slot = Some(flag);
                }
            }
            FieldKind::Licenses => {
                self.licenses = match value {
                    Value::Null => Vec::new(),
                    Value::Sequence(items) => {
                        let mut licenses: Vec<LicenseReference> = Vec::with_capacity(items.len());
                        for item in items {
                            let definition: LicenseDefinition = serde_yaml::from_value(item.clone())?;
                            let license = LicenseReference::from_definition(definition);
                            // Unique by key: the first entry wins.
                            if !licenses.iter().any(|l| l.key == license.key) {
                                licenses.push(license);
                            }
                        }
                        licenses
                    }
                    other => bail!("expected a list of licenses, found {other:?}"),
                };
            }
            FieldKind::NameList => self.license_name = convert::string_list(value),
            FieldKind::Text | FieldKind::Copyright | FieldKind::Resource | FieldKind::Expression => {
                let Some(text) = convert::scalar_to_string(value) else {
                    return Ok(());
                };
                let text = match spec.kind {
                    FieldKind::Copyright => convert::copyright(&text),
                    FieldKind::Resource => convert::about_resource(&text),
                    FieldKind::Expression => convert::license_expression(&text)?,
                    _ => text,
                };
                if let Some(slot) = self.text_mut(key) {
                    *slot = Some(text).filter(|t| !t.is_empty());
                }
            }
        }
        Ok(())
    }

    fn text_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        let slot = match name {
            "about_resource" => &mut self.about_resource,
            "name" => &mut self.name,
            "version" => &mut self.version,
            "description" => &mut self.description,
            "homepage_url" => &mut self.homepage_url,
            "download_url" => &mut self.download_url,
            "notes" => &mut self.notes,
            "copyright" => &mut self.copyright,
            "license_expression" => &mut self.license_expression,
            "notice_file" => &mut self.notice_file,
            "notice_text" => &mut self.notice_text,
            "notice_url" => &mut self.notice_url,
            "changelog_file" => &mut self.changelog_file,
            "owner" => &mut self.owner,
            "owner_url" => &mut self.owner_url,
            "vcs_tool" => &mut self.vcs_tool,
            "vcs_repository" => &mut self.vcs_repository,
            "vcs_revision" => &mut self.vcs_revision,
            "checksum_md5" => &mut self.checksum_md5,
            "checksum_sha1" => &mut self.checksum_sha1,
            "checksum_sha256" => &mut self.checksum_sha256,
            "spec_version" => &mut self.spec_version,
            _ => return None,
        };
        Some(slot)
    }

    /// Value of a text field by name.
    pub fn text(&self, name: &str) -> Option<&str> {
        let value = match name {
            "about_resource" => &self.about_resource,
            "name" => &self.name,
            "version" => &self.version,
            "description" => &self.description,
            "homepage_url" => &self.homepage_url,
            "download_url" => &self.download_url,
            "notes" => &self.notes,
            "copyright" => &self.copyright,
            "license_expression" => &self.license_expression,
            "notice_file" => &self.notice_file,
            "notice_text" => &self.notice_text,
            "notice_url" => &self.notice_url,
            "changelog_file" => &self.changelog_file,
            "owner" => &self.owner,
            "owner_url" => &self.owner_url,
            "vcs_tool" => &self.vcs_tool,
            "vcs_repository" => &self.vcs_repository,
            "vcs_revision" => &self.vcs_revision,
            "checksum_md5" => &self.checksum_md5,
            "checksum_sha1" => &self.checksum_sha1,
            "checksum_sha256" => &self.checksum_sha256,
            "spec_version" => &self.spec_version,
            _ => return None,
        };
        value.as_deref()
    }

    fn flag_mut(&mut self, name: &str) -> Option<&mut Option<Flag>> {
        match name {
            "attribute" => Some(&mut self.attribute),
            "redistribute" => Some(&mut self.redistribute),
            "modified" => Some(&mut self.modified),
            "track_changes" => Some(&mut self.track_changes),
            "internal_use_only" => Some(&mut self.internal_use_only),
            _ => None,
        }
    }

    /// Value of a flag field by name.
    pub fn flag(&self, name: &str) -> Option<&Flag> {
        match name {
            "attribute" => self.attribute.as_ref(),
            "redistribute" => self.redistribute.as_ref(),
            "modified" => self.modified.as_ref(),
            "track_changes" => self.track_changes.as_ref(),
            "internal_use_only" => self.internal_use_only.as_ref(),
            _ => None,
        }
    }

    /// Check the record and rebuild [`Self::errors`] from scratch.
    pub fn validate(&mut self) -> &[Diagnostic] {
        let mut errors = Vec::new();

        if self.about_resource.as_deref().map_or(true, str::is_empty) {
            errors.push(Diagnostic::critical(
                "Field about_resource is required and empty or missing.",
            ));
        }

        for name in self.custom_fields.keys() {
            if !VALID_FIELD_NAME.is_match(name) {
                errors.push(Diagnostic::critical(format!(
                    "Field name: '{name}' contains illegal characters. \
                     Only these characters are allowed: \
                     ASCII letters, digits and \"_\" underscore. \
                     The first characters must be a letter"
                )));
            }
            errors.push(Diagnostic::info(format!("Field {name} is a custom field.")));
        }

        for name in FLAG_VALIDATION_ORDER {
            if let Some(Flag::Invalid(value)) = self.flag(name) {
                errors.push(Diagnostic::critical(format!(
                    "Field name: '{name}' has an invalid flag value: '{value}': \
                     should be one of yes or no or true or false."
                )));
            }
        }

        self.errors = errors;
        &self.errors
    }

    /// Names of the standard fields that `serialize` can emit.
    pub fn standard_fields() -> Vec<&'static str> {
        STANDARD_FIELDS
            .iter()
            .filter(|f| f.serialized)
            .map(|f| f.name)
            .collect()
    }

    /// Standard and custom field names that currently hold a value.
    pub fn fields(&self) -> (Vec<&'static str>, Vec<String>) {
        let data = self.to_mapping();
        let standard = STANDARD_FIELDS
            .iter()
            .filter(|f| data.contains_key(f.name))
            .map(|f| f.name)
            .collect();
        let custom = self
            .custom_fields
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        (standard, custom)
    }

    fn base_dir(&self, base_dir: Option<&Path>) -> Option<PathBuf> {
        base_dir
            .map(Path::to_path_buf)
            .or_else(|| self.location.as_deref().and_then(Path::parent).map(Path::to_path_buf))
    }

    pub fn about_resource_loc(&self, base_dir: &Path) -> Option<PathBuf> {
        self.about_resource.as_ref().map(|p| base_dir.join(p))
    }

    pub fn notice_file_loc(&self, base_dir: &Path) -> Option<PathBuf> {
        self.notice_file.as_ref().map(|p| base_dir.join(p))
    }

    pub fn changelog_file_loc(&self, base_dir: &Path) -> Option<PathBuf> {
        self.changelog_file.as_ref().map(|p| base_dir.join(p))
    }

    /// Check that every referenced file exists, appending a CRITICAL error
    /// per missing path. `base_dir` defaults to the directory of `location`.
    pub fn check_files(&mut self, base_dir: Option<&Path>) -> &[Diagnostic] {
        if let Some(location) = &self.location {
            if !location.exists() {
                self.errors.push(Diagnostic::critical(format!(
                    "ABOUT file location: {} does not exists.",
                    location.display()
                )));
            }
        }

        let base_dir = match self.base_dir(base_dir) {
            Some(dir) if dir.exists() => dir,
            other => {
                let shown = other.map(|d| d.display().to_string()).unwrap_or_default();
                self.errors.push(Diagnostic::critical(format!(
                    "base_dir: {shown} does not exists: unable to check files existence."
                )));
                return &self.errors;
            }
        };

        let mut missing = Vec::new();
        let referenced = [
            ("about_resource", self.about_resource_loc(&base_dir), &self.about_resource),
            ("notice_file", self.notice_file_loc(&base_dir), &self.notice_file),
            ("changelog_file", self.changelog_file_loc(&base_dir), &self.changelog_file),
        ];
        for (field, loc, value) in referenced {
            if let (Some(loc), Some(value)) = (loc, value) {
                if !loc.exists() {
                    missing.push(Diagnostic::critical(format!(
                        "File {field}: \"{value}\" does not exists"
                    )));
                }
            }
        }

        for license in &self.licenses {
            if !license.file_loc(&base_dir).exists() {
                missing.push(Diagnostic::critical(format!(
                    "License file: \"{}\" does not exists",
                    license.file
                )));
            }
        }

        self.errors.extend(missing);
        &self.errors
    }

    /// Load the notice text and the text of every license that has none yet.
    /// Unreadable files are reported and skipped; the new errors are also
    /// appended to [`Self::errors`].
    pub fn load_files(&mut self, base_dir: Option<&Path>) -> Vec<Diagnostic> {
        let Some(base_dir) = self.base_dir(base_dir) else {
            let errors = vec![Diagnostic::critical(
                "Unable to load files: no base directory and no record location.",
            )];
            self.errors.extend(errors.iter().cloned());
            return errors;
        };

        let mut errors = Vec::new();

        if let Some(loc) = self.notice_file_loc(&base_dir) {
            match std::fs::read(&loc) {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    if !text.is_empty() {
                        self.notice_text = Some(text);
                    }
                }
                Err(e) => errors.push(Diagnostic::critical(format!(
                    "Unable to read text file: {}\n{e}",
                    loc.display()
                ))),
            }
        }

        for license in self.licenses.iter_mut().filter(|l| !l.has_text()) {
            if let Err(e) = license.load_text(&base_dir) {
                let message = match e {
                    LicenseError::Io { path, source } => {
                        format!("Unable to read text file: {}\n{source}", path.display())
                    }
                    other => other.to_string(),
                };
                errors.push(Diagnostic::critical(message));
            }
        }

        self.errors.extend(errors.iter().cloned());
        errors
    }

    /// Fill unset license data from the reference library entry sharing its key.
    pub fn apply_references(&mut self, library: &ReferenceLibrary) -> Result<(), LicenseError> {
        for license in &mut self.licenses {
            if let Some(reference) = library.get(&license.key) {
                license.update(reference)?;
            }
        }
        Ok(())
    }

    /// Loaded non-empty license texts keyed by text file name, first
    /// occurrence wins.
    pub fn license_file_texts(&self) -> IndexMap<String, String> {
        let mut texts = IndexMap::new();
        for license in &self.licenses {
            if let Some(text) = license.text.as_ref().filter(|t| !t.is_empty()) {
                texts
                    .entry(license.file_name().to_string())
                    .or_insert_with(|| text.clone());
            }
        }
        texts
    }

    /// Ordered mapping of every non-empty serialized field. Custom fields
    /// follow the standard ones in insertion order.
    pub fn to_mapping(&self) -> Mapping {
        let mut data = Mapping::new();
        for spec in STANDARD_FIELDS.iter().filter(|f| f.serialized) {
            let value = match spec.kind {
                FieldKind::Flag => self
                    .flag(spec.name)
                    .and_then(Flag::to_token)
                    .map(Value::from),
                FieldKind::Licenses => Some(Value::Sequence(
                    self.licenses
                        .iter()
                        .map(|l| Value::Mapping(l.to_mapping()))
                        .collect(),
                ))
                .filter(|_| !self.licenses.is_empty()),
                FieldKind::NameList => Some(Value::Sequence(
                    self.license_name.iter().map(|n| Value::from(n.as_str())).collect(),
                ))
                .filter(|_| !self.license_name.is_empty()),
                _ => self
                    .text(spec.name)
                    .filter(|t| !t.is_empty())
                    .map(Value::from),
            };
            if let Some(value) = value {
                data.insert(Value::from(spec.name), value);
            }
        }
        for (key, value) in &self.custom_fields {
            if !value.is_empty() {
                data.insert(Value::from(key.as_str()), Value::from(value.as_str()));
            }
        }
        data
    }

    /// YAML representation of this record.
    pub fn serialize(&self) -> Result<String> {
        serde_yaml::to_string(&self.to_mapping()).map_err(|e| anyhow!("Failed to serialize record: {e}"))
    }

    /// Write this record as YAML at `location`; with `with_files`, also write
    /// the referenced notice and license text files next to it.
    pub fn write(&self, location: &Path, with_files: bool) -> Result<()> {
        if let Some(parent) = location.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(location, self.serialize()?)
            .with_context(|| format!("Failed to write {}", location.display()))?;

        if with_files {
            let base_dir = location.parent().unwrap_or_else(|| Path::new("."));
            self.write_files(base_dir)?;
        }
        Ok(())
    }

    /// Write the notice and license texts under `base_dir`; missing texts
    /// become empty files.
    pub fn write_files(&self, base_dir: &Path) -> Result<()> {
        let mut targets: Vec<(PathBuf, &str)> = Vec::new();
        if let Some(loc) = self.notice_file_loc(base_dir) {
            targets.push((loc, self.notice_text.as_deref().unwrap_or_default()));
        }
        for license in &self.licenses {
            targets.push((
                license.file_loc(base_dir),
                license.text.as_deref().unwrap_or_default(),
            ));
        }

        for (loc, text) in targets {
            if let Some(parent) = loc.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&loc, text)
                .with_context(|| format!("Failed to write {}", loc.display()))?;
        }
        Ok(())
    }

    pub fn has_critical_errors(&self) -> bool {
        self.errors.iter().any(Diagnostic::is_critical)
    }
}
