//! Changed-file selection: glob matching and review eligibility.

pub mod filter;
pub mod pattern;
