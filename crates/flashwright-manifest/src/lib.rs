//! Requirement document parsing for Flashwright.
//!
//! Builds ship a small line-oriented document (traditionally named
//! `android-info.txt`) declaring which boards the images support and which
//! firmware versions they expect. This crate turns that document into an
//! immutable [`RequirementMap`] and answers the lookups the flashing
//! orchestrator needs.
//!
//! Recognised lines:
//!
//! ```text
//! # comment
//! require board=sailfish|marlin
//! require-for-product:marlin version-bootloader=8996-012001-1904111800
//! version-baseband=8996-130091-1802061512
//! ```
//!
//! Anything else is ignored; parsing never fails.
//!
//! # Example
//!
//! ```
//! use flashwright_manifest::RequirementMap;
//!
//! let map = RequirementMap::parse("require board=alpha|beta\n");
//! assert!(map.accepts_board("ALPHA"));
//! assert!(!map.accepts_board("gamma"));
//! ```

mod map;
mod parser;

pub use map::{BOARD_KEY, PRODUCT_KEY, RequirementMap};

#[cfg(test)]
mod tests;
