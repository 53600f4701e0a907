//! Explicit field schema of a metadata record.
//!
//! Parsing, serialization and field enumeration all walk [`STANDARD_FIELDS`]
//! in order; there is no runtime introspection of the record struct.

/// How a field's raw value is converted and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Trimmed free text.
    Text,
    /// Free text trimmed line by line.
    Copyright,
    /// POSIX relative path without leading or trailing slash.
    Resource,
    /// Canonicalized license expression.
    Expression,
    /// yes/no flag.
    Flag,
    /// List of license definitions.
    Licenses,
    /// List of display names.
    NameList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Whether the field is written back by `serialize`.
    pub serialized: bool,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        serialized: true,
    }
}

pub const STANDARD_FIELDS: &[FieldSpec] = &[
    field("about_resource", FieldKind::Resource),
    field("name", FieldKind::Text),
    field("version", FieldKind::Text),
    field("description", FieldKind::Text),
    field("homepage_url", FieldKind::Text),
    field("download_url", FieldKind::Text),
    field("notes", FieldKind::Text),
    field("copyright", FieldKind::Copyright),
    field("license_expression", FieldKind::Expression),
    field("attribute", FieldKind::Flag),
    field("redistribute", FieldKind::Flag),
    field("modified", FieldKind::Flag),
    field("track_changes", FieldKind::Flag),
    field("internal_use_only", FieldKind::Flag),
    field("licenses", FieldKind::Licenses),
    field("license_name", FieldKind::NameList),
    field("notice_file", FieldKind::Text),
    FieldSpec {
        name: "notice_text",
        kind: FieldKind::Text,
        serialized: false,
    },
    field("notice_url", FieldKind::Text),
    field("changelog_file", FieldKind::Text),
    field("owner", FieldKind::Text),
    field("owner_url", FieldKind::Text),
    field("vcs_tool", FieldKind::Text),
    field("vcs_repository", FieldKind::Text),
    field("vcs_revision", FieldKind::Text),
    field("checksum_md5", FieldKind::Text),
    field("checksum_sha1", FieldKind::Text),
    field("checksum_sha256", FieldKind::Text),
    field("spec_version", FieldKind::Text),
];

/// Flag fields in the order their violations are reported.
pub const FLAG_VALIDATION_ORDER: &[&str] = &[
    "redistribute",
    "attribute",
    "track_changes",
    "modified",
    "internal_use_only",
];

/// Names used by the record itself that input data may not claim.
pub const RESERVED_FIELDS: &[&str] = &[
    "errors",
    "custom_fields",
    "location",
    "license_name_expression",
];

pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
    STANDARD_FIELDS.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_unique() {
        let mut names: Vec<_> = STANDARD_FIELDS.iter().map(|f| f.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), STANDARD_FIELDS.len());
    }

    #[test]
    fn test_flags_declared_as_flags() {
        for name in FLAG_VALIDATION_ORDER {
            assert_eq!(lookup(name).map(|f| f.kind), Some(FieldKind::Flag));
        }
        assert!(lookup("custom").is_none());
        assert!(!lookup("notice_text").unwrap().serialized);
    }
}
