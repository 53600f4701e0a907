use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{debug, error, warn};

use crate::error::LicenseError;
use crate::models::Diagnostic;

/// Suffix of a license text file named after its key.
pub const LICENSE_FILE_SUFFIX: &str = ".LICENSE";

/// Structured definition of a license as found in a `<key>.yml` file or in
/// the `licenses` list of a record.
#[derive(Debug, Clone, Deserialize)]
pub struct LicenseDefinition {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// One license: its identity, where its text lives and, once loaded, the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseReference {
    pub key: String,
    pub name: Option<String>,
    /// Path of the text file relative to a base directory.
    pub file: String,
    pub url: Option<String>,
    pub text: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl LicenseReference {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            file: default_file_name(&key),
            key,
            name: None,
            url: None,
            text: None,
        }
    }

    pub fn from_definition(definition: LicenseDefinition) -> Self {
        let mut license = Self::new(definition.key.trim());
        license.name = non_empty(definition.name);
        license.url = non_empty(definition.url);
        if let Some(file) = non_empty(definition.file) {
            license.file = file;
        }
        license
    }

    /// Build a license from the YAML definition file at `location`.
    pub fn load(location: &Path) -> Result<Self, LicenseError> {
        let content = std::fs::read_to_string(location).map_err(|source| LicenseError::Io {
            path: location.to_path_buf(),
            source,
        })?;
        let definition: LicenseDefinition =
            serde_yaml::from_str(&content).map_err(|source| LicenseError::Decode {
                path: location.to_path_buf(),
                source,
            })?;
        Ok(Self::from_definition(definition))
    }

    pub fn default_file_name(&self) -> String {
        default_file_name(&self.key)
    }

    pub fn file_loc(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.file)
    }

    /// File name of the text file, without any directory part.
    pub fn file_name(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }

    /// Read the license text from `base_dir`. Invalid UTF-8 is replaced,
    /// never rejected. An empty file leaves the text unset.
    pub fn load_text(&mut self, base_dir: &Path) -> Result<(), LicenseError> {
        let path = self.file_loc(base_dir);
        let bytes = std::fs::read(&path).map_err(|source| LicenseError::Io { path, source })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if !text.is_empty() {
            self.text = Some(text);
        }
        Ok(())
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Fill the unset fields of `self` from `other`. Both must share a key.
    pub fn update(&mut self, other: &LicenseReference) -> Result<(), LicenseError> {
        if other.key != self.key {
            error!(expected = %self.key, found = %other.key, "refusing to merge licenses with different keys");
            return Err(LicenseError::KeyMismatch {
                expected: self.key.clone(),
                found: other.key.clone(),
            });
        }
        if self.name.is_none() {
            self.name = other.name.clone();
        }
        if self.text.as_deref().map_or(true, str::is_empty) {
            self.text = other.text.clone();
        }
        if self.file.is_empty() {
            self.file = other.file.clone();
        }
        if self.url.is_none() {
            self.url = other.url.clone();
        }
        Ok(())
    }

    /// Ordered mapping of the non-empty fields, text excluded.
    pub fn to_mapping(&self) -> Mapping {
        let mut data = Mapping::new();
        let fields = [
            ("key", Some(&self.key)),
            ("name", self.name.as_ref()),
            ("file", Some(&self.file)),
            ("url", self.url.as_ref()),
        ];
        for (field, value) in fields {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                data.insert(Value::from(field), Value::from(value.as_str()));
            }
        }
        data
    }

    /// Write `<key>.yml` and the license text file into `target_dir`.
    /// A missing text is written as an empty file.
    pub fn dump(&self, target_dir: &Path) -> Result<(), LicenseError> {
        let data_loc = target_dir.join(format!("{}.yml", self.key));
        let yaml = serde_yaml::to_string(&self.to_mapping()).map_err(|source| {
            LicenseError::Encode {
                path: data_loc.clone(),
                source,
            }
        })?;
        write_file(&data_loc, &yaml)?;

        let text = self.text.as_deref().unwrap_or_default();
        if text.is_empty() {
            warn!(key = %self.key, "license text is empty");
        }
        write_file(&self.file_loc(target_dir), text)
    }
}

fn default_file_name(key: &str) -> String {
    format!("{key}{LICENSE_FILE_SUFFIX}")
}

fn write_file(path: &Path, content: &str) -> Result<(), LicenseError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LicenseError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, content).map_err(|source| LicenseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Licenses and notices loaded from a reference directory.
#[derive(Debug, Default)]
pub struct ReferenceLibrary {
    pub licenses: IndexMap<String, LicenseReference>,
    /// Standalone notice texts keyed by file name.
    pub notices: IndexMap<String, String>,
    pub errors: Vec<Diagnostic>,
}

impl ReferenceLibrary {
    pub fn get(&self, key: &str) -> Option<&LicenseReference> {
        self.licenses.get(key)
    }
}

/// Load a reference library from `reference_dir`.
///
/// Every `*.yml` file is a license definition paired with its text file;
/// every other file not consumed that way is a notice.
pub fn load_license_references(reference_dir: &Path) -> Result<ReferenceLibrary> {
    let mut names: Vec<String> = std::fs::read_dir(reference_dir)
        .with_context(|| format!("Failed to read reference directory {}", reference_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();

    let (data_files, mut text_files): (Vec<String>, Vec<String>) =
        names.into_iter().partition(|name| name.ends_with(".yml"));

    let mut library = ReferenceLibrary::default();

    for data_file in data_files {
        let mut license = LicenseReference::load(&reference_dir.join(&data_file))
            .with_context(|| format!("Invalid license definition {data_file}"))?;

        match text_files.iter().position(|name| name == &license.file) {
            Some(index) => {
                text_files.remove(index);
                if let Err(e) = license.load_text(reference_dir) {
                    library.errors.push(Diagnostic::critical(e.to_string()));
                }
            }
            None => {
                error!(key = %license.key, file = %license.file, "license has no text file");
                library.errors.push(Diagnostic::critical(format!(
                    "The license: {} does not have a corresponding text file: {}",
                    license.key, license.file
                )));
            }
        }
        debug!(key = %license.key, "loaded reference license");
        library.licenses.insert(license.key.clone(), license);
    }

    for notice_file in text_files {
        let bytes = std::fs::read(reference_dir.join(&notice_file))
            .with_context(|| format!("Failed to read notice file {notice_file}"))?;
        library
            .notices
            .insert(notice_file, String::from_utf8_lossy(&bytes).into_owned());
    }

    Ok(library)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_new_defaults_file_name() {
        let license = LicenseReference::new("mit");
        assert_eq!(license.file, "mit.LICENSE");
        assert_eq!(license.text, None);
        assert_eq!(license.file_loc(Path::new("/base")), PathBuf::from("/base/mit.LICENSE"));
    }

    #[test]
    fn test_load_definition() {
        let dir = TempDir::new().unwrap();
        let loc = dir.path().join("apache-2.0.yml");
        std::fs::write(
            &loc,
            "key: apache-2.0\nname: Apache License 2.0\nurl: https://www.apache.org/licenses/LICENSE-2.0\n",
        )
        .unwrap();

        let license = LicenseReference::load(&loc).unwrap();
        assert_eq!(license.key, "apache-2.0");
        assert_eq!(license.name.as_deref(), Some("Apache License 2.0"));
        assert_eq!(license.file, "apache-2.0.LICENSE");
        assert!(license.text.is_none());
    }

    #[test]
    fn test_load_malformed_definition() {
        let dir = TempDir::new().unwrap();
        let loc = dir.path().join("broken.yml");
        std::fs::write(&loc, "name: no key here\n").unwrap();
        assert!(matches!(
            LicenseReference::load(&loc),
            Err(LicenseError::Decode { .. })
        ));
    }

    #[test]
    fn test_load_text_replaces_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("mit.LICENSE"), b"caf\xe9 license").unwrap();

        let mut license = LicenseReference::new("mit");
        license.load_text(dir.path()).unwrap();
        assert_eq!(license.text.as_deref(), Some("caf\u{FFFD} license"));
    }

    #[test]
    fn test_load_text_ignores_empty_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("mit.LICENSE"), "").unwrap();

        let mut license = LicenseReference::new("mit");
        license.load_text(dir.path()).unwrap();
        assert_eq!(license.text, None);
        assert!(!license.has_text());
    }

    #[test]
    fn test_update_fills_unset_fields_only() {
        let mut license = LicenseReference::new("mit");
        license.name = Some("Local MIT".to_string());

        let mut other = LicenseReference::new("mit");
        other.name = Some("MIT License".to_string());
        other.url = Some("https://opensource.org/licenses/MIT".to_string());
        other.text = Some("Permission is hereby granted".to_string());

        license.update(&other).unwrap();
        assert_eq!(license.name.as_deref(), Some("Local MIT"));
        assert_eq!(license.url, other.url);
        assert_eq!(license.text, other.text);
    }

    #[test]
    fn test_update_rejects_other_key() {
        let mut license = LicenseReference::new("mit");
        let other = LicenseReference::new("isc");
        let err = license.update(&other).unwrap_err();
        assert!(matches!(err, LicenseError::KeyMismatch { .. }));
        assert_eq!(license, LicenseReference::new("mit"));
    }

    #[test]
    fn test_dump_writes_definition_and_empty_text() {
        let dir = TempDir::new().unwrap();
        let mut license = LicenseReference::new("zlib");
        license.name = Some("Zlib License".to_string());
        license.dump(dir.path()).unwrap();

        let reloaded = LicenseReference::load(&dir.path().join("zlib.yml")).unwrap();
        assert_eq!(reloaded.name.as_deref(), Some("Zlib License"));
        let text = std::fs::read_to_string(dir.path().join("zlib.LICENSE")).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn test_load_license_references() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        std::fs::write(base.join("mit.yml"), "key: mit\nname: MIT License\n").unwrap();
        std::fs::write(base.join("mit.LICENSE"), "MIT text").unwrap();
        std::fs::write(base.join("custom.yml"), "key: custom\nfile: CUSTOM.txt\n").unwrap();
        std::fs::write(base.join("CUSTOM.txt"), "custom text").unwrap();
        std::fs::write(base.join("orphan.yml"), "key: orphan\n").unwrap();
        std::fs::write(base.join("NOTICE"), "a notice").unwrap();

        let library = load_license_references(base).unwrap();

        assert_eq!(
            library.licenses.keys().collect::<Vec<_>>(),
            vec!["custom", "mit", "orphan"]
        );
        assert_eq!(library.get("mit").unwrap().text.as_deref(), Some("MIT text"));
        assert_eq!(library.get("custom").unwrap().text.as_deref(), Some("custom text"));
        assert_eq!(library.get("orphan").unwrap().text, None);
        assert_eq!(library.notices.len(), 1);
        assert_eq!(library.notices["NOTICE"], "a notice");
        assert_eq!(library.errors.len(), 1);
        assert!(library.errors[0].message.contains("orphan"));
    }
}
