//! Small helpers shared across the pipeline crates.

pub mod config;
pub mod env;
