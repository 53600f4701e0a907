use serde::{Deserialize, Serialize};

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single finding recorded while parsing, validating or loading a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Critical,
            message: message.into(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Diagnostics attributed to the record (or other source) they came from.
#[derive(Debug, Clone, Serialize)]
pub struct SourcedDiagnostic {
    pub source: String,
    #[serde(flatten)]
    pub diagnostic: Diagnostic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Diagnostic::critical("boom").to_string(),
            "CRITICAL: boom"
        );
        assert_eq!(Diagnostic::info("note").to_string(), "INFO: note");
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::Info);
        assert!(Diagnostic::critical("x").is_critical());
        assert!(!Diagnostic::info("x").is_critical());
    }
}
