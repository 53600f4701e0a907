//! License identity, expressions and identifier vocabularies.
//!
//! - [`reference`]: [`LicenseReference`](reference::LicenseReference) and the
//!   on-disk reference library of license definitions and texts.
//! - [`expression`]: parses boolean license expressions into canonical form
//!   and ordered unique keys.
//! - [`mapping`]: license key ↔ SPDX identifier translation and the table of
//!   common licenses.

pub mod expression;
pub mod mapping;
pub mod reference;
