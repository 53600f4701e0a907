//! Provenance metadata and attribution.
//!
//! Loads `.ABOUT` YAML records describing third-party components, validates
//! them, resolves their license expressions against a reference library and
//! renders attribution documents through templates.

pub mod attrib;
pub mod config;
pub mod error;
pub mod inventory;
pub mod license;
pub mod models;
pub mod record;
pub mod report;
