use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;

use crate::error::ExpressionError;
use crate::license::expression;
use crate::record::MetadataRecord;

/// Well-known license keys exposed to attribution templates.
pub const COMMON_LICENSES: &[&str] = &[
    "agpl-3.0",
    "agpl-3.0-plus",
    "apache-1.1",
    "apache-2.0",
    "artistic-2.0",
    "boost-1.0",
    "bsd-new",
    "bsd-original",
    "bsd-simplified",
    "bsd-zero",
    "cc-by-3.0",
    "cc-by-4.0",
    "cc0-1.0",
    "cddl-1.0",
    "epl-1.0",
    "epl-2.0",
    "gpl-2.0",
    "gpl-2.0-plus",
    "gpl-3.0",
    "gpl-3.0-plus",
    "isc",
    "lgpl-2.0",
    "lgpl-2.0-plus",
    "lgpl-2.1",
    "lgpl-2.1-plus",
    "lgpl-3.0",
    "lgpl-3.0-plus",
    "mit",
    "mpl-1.1",
    "mpl-2.0",
    "openssl-ssleay",
    "python",
    "unlicense",
    "x11",
    "zlib",
];

const BUNDLED_MAPPING: &str = include_str!("../../data/spdx_mapping.json");

/// Which vocabulary an identifier is translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// License key → SPDX identifier.
    #[default]
    KeyToSpdx,
    /// SPDX identifier → license key.
    SpdxToKey,
}

/// Bidirectional table between license keys and SPDX identifiers.
#[derive(Debug, Clone)]
pub struct LicenseMapping {
    key_to_spdx: IndexMap<String, String>,
    spdx_to_key: IndexMap<String, String>,
}

impl LicenseMapping {
    /// The table shipped with the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_MAPPING).context("Bundled license mapping is invalid")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read license mapping {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid license mapping {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let key_to_spdx: IndexMap<String, String> = serde_json::from_str(json)?;
        Ok(Self::from_table(key_to_spdx))
    }

    /// The reverse table is a plain inversion; a duplicated SPDX value maps
    /// back to the last key listing it.
    pub fn from_table(key_to_spdx: IndexMap<String, String>) -> Self {
        let spdx_to_key = key_to_spdx
            .iter()
            .map(|(k, v)| (v.clone(), k.clone()))
            .collect();
        Self {
            key_to_spdx,
            spdx_to_key,
        }
    }

    fn table(&self, direction: Direction) -> &IndexMap<String, String> {
        match direction {
            Direction::KeyToSpdx => &self.key_to_spdx,
            Direction::SpdxToKey => &self.spdx_to_key,
        }
    }

    pub fn translate(&self, id: &str, direction: Direction) -> Option<&str> {
        self.table(direction).get(id).map(String::as_str)
    }

    /// Translate every operand of `expression`; unknown operands are kept.
    pub fn translate_expression(
        &self,
        expression: &str,
        direction: Direction,
    ) -> Result<String, ExpressionError> {
        let expr = expression::parse(expression)?;
        let translated = expr.map_keys(&|key: &str| {
            self.translate(key, direction).unwrap_or(key).to_string()
        });
        Ok(translated.to_string())
    }

    /// Rewrite the expression and license keys of `record`. License files
    /// still named after the old key follow the new key.
    pub fn translate_record(
        &self,
        record: &mut MetadataRecord,
        direction: Direction,
    ) -> Result<(), ExpressionError> {
        if let Some(expr) = &record.license_expression {
            record.license_expression = Some(self.translate_expression(expr, direction)?);
        }
        for license in &mut record.licenses {
            let Some(new_key) = self.translate(&license.key, direction) else {
                continue;
            };
            let follows_key = license.file == license.default_file_name();
            license.key = new_key.to_string();
            if follows_key {
                license.file = license.default_file_name();
            }
        }
        Ok(())
    }
}
