use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::attrib::KeyDerivation;

/// Root configuration structure, deserialized from `.about-attrib/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub attribution: AttributionConfig,
}

/// Settings for the `attrib` command.
#[derive(Debug, Default, Deserialize)]
pub struct AttributionConfig {
    /// Template file; the bundled HTML template is used when unset.
    pub template: Option<PathBuf>,
    #[serde(default)]
    pub key_derivation: KeyDerivation,
    /// Directory holding license definitions (`<key>.yml`) and texts.
    pub reference_dir: Option<PathBuf>,
    /// Extra variables exposed to templates as `vartext`.
    #[serde(default)]
    pub vartext: IndexMap<String, String>,
}

impl Config {
    /// Configured vartext with `overrides` applied on top.
    pub fn merged_vartext(&self, overrides: &IndexMap<String, String>) -> IndexMap<String, String> {
        let mut vartext = self.attribution.vartext.clone();
        for (key, value) in overrides {
            vartext.insert(key.clone(), value.clone());
        }
        vartext
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;

        // Relative paths are relative to the config file.
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let attribution = &mut config.attribution;
        attribution.template = attribution.template.take().map(|p| base.join(p));
        attribution.reference_dir = attribution.reference_dir.take().map(|p| base.join(p));
        Ok(config)
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`: path passed via `--config`
/// 2. `<project_path>/.about-attrib/config.toml`
/// 3. `~/.config/about-attrib/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return Config::from_file(path);
    }

    let project_dir = if project_path.is_file() {
        project_path.parent().unwrap_or_else(|| Path::new("."))
    } else {
        project_path
    };
    let project_config = project_dir.join(".about-attrib").join("config.toml");
    if project_config.exists() {
        return Config::from_file(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("about-attrib").join("config.toml");
        if home_config.exists() {
            return Config::from_file(&home_config);
        }
    }

    Ok(Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let config_dir = dir.join(".about-attrib");
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_project_config_resolves_paths() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"
[attribution]
template = "custom.html"
key_derivation = "legacy"
reference_dir = "licenses"

[attribution.vartext]
product = "Acme"
"#,
        );

        let config = load_config(dir.path(), None).unwrap();
        let attribution = &config.attribution;
        let config_dir = dir.path().join(".about-attrib");
        assert_eq!(attribution.template, Some(config_dir.join("custom.html")));
        assert_eq!(attribution.reference_dir, Some(config_dir.join("licenses")));
        assert_eq!(attribution.key_derivation, KeyDerivation::Legacy);
        assert_eq!(attribution.vartext["product"], "Acme");
    }

    #[test]
    fn test_override_wins() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "[attribution]\nkey_derivation = \"legacy\"\n");
        let other = dir.path().join("other.toml");
        std::fs::write(&other, "[attribution]\nkey_derivation = \"exact\"\n").unwrap();

        let config = load_config(dir.path(), Some(&other)).unwrap();
        assert_eq!(config.attribution.key_derivation, KeyDerivation::Exact);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let config = load_config(dir.path(), Some(&path)).unwrap();
        assert_eq!(config.attribution.template, None);
        assert_eq!(config.attribution.key_derivation, KeyDerivation::Exact);
        assert!(config.attribution.vartext.is_empty());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[attribution]\nkey_derivation = \"fuzzy\"\n").unwrap();
        assert!(load_config(dir.path(), Some(&path)).is_err());
    }

    #[test]
    fn test_merged_vartext_overrides() {
        let mut config = Config::default();
        config.attribution.vartext.insert("product".into(), "Acme".into());
        config.attribution.vartext.insert("title".into(), "Notices".into());

        let mut overrides = IndexMap::new();
        overrides.insert("product".to_string(), "Acme Pro".to_string());
        let merged = config.merged_vartext(&overrides);
        assert_eq!(merged["product"], "Acme Pro");
        assert_eq!(merged["title"], "Notices");
    }
}
