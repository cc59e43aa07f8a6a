//! # Configuration Module
//!
//! Centralizes the fixed on-disk constants shared by both index engines.
//! Runtime geometry (key/value widths, node order) is derived per index by
//! [`crate::record::RecordLayout`] and [`crate::btree::NodeLayout`]; the
//! values here are the parts of the format that never vary.
//!
//! Import constants from this module rather than defining them locally so
//! interdependent values cannot drift apart.

pub mod constants;

pub use constants::*;
