//! Typed errors for the library seams.
//!
//! Record-level problems are never raised: they accumulate as
//! [`Diagnostic`](crate::models::Diagnostic)s. The enums here cover the
//! remaining contract failures that a caller has to branch on.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to parse a license expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("empty license expression")]
    Empty,

    #[error("unexpected token {token:?} at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("unexpected end of license expression")]
    UnexpectedEnd,

    #[error("unbalanced parenthesis in license expression")]
    UnbalancedParen,

    #[error("license expression contains unsupported character(s): {}", format_chars(.0))]
    DisallowedCharacters(Vec<char>),
}

fn format_chars(chars: &[char]) -> String {
    chars
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Errors raised by [`LicenseReference`](crate::license::reference::LicenseReference) operations.
#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("cannot merge license {found:?} into license {expected:?}: keys differ")]
    KeyMismatch { expected: String, found: String },

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid license definition in '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot serialize license definition for '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// The key list from an expression and the display-name list of a record
/// must have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("license_name lists {names} name(s) but license_expression {expression:?} has {keys} key(s)")]
pub struct MismatchedLicenseNames {
    pub expression: String,
    pub keys: usize,
    pub names: usize,
}

/// Failure to produce an attribution document.
///
/// The `Display` form is the inline message written in place of the
/// document when rendering fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Template validation error at line: {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Template processing error{}: {message}", format_line(.line))]
    Runtime { line: Option<usize>, message: String },

    #[error("Template processing error: {0}")]
    MismatchedNames(#[from] MismatchedLicenseNames),
}

fn format_line(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" at line: {line}"),
        None => String::new(),
    }
}
