//! Layered ingestion and incremental-merge engine for the football data lake.
//!
//! The lake has three progressively refined layers:
//! - **Bronze**: append-only flattened API payloads, partitioned by ingest
//!   date (historical audit trail; never rewritten).
//! - **Silver**: one schema-unified row per natural key, maintained by a
//!   last-write-wins merge ([`silver::Normalizer`]).
//! - **Gold**: analysis-ready denormalized tables derived from Silver
//!   ([`gold::Curator`]); always rebuildable.
//!
//! [`flow::FlowController`] sequences Bronze → Silver → Gold per entity and
//! tracks per-entity watermarks in SQLite ([`state`]).

#![deny(missing_docs)]

pub mod bronze;
pub mod config;
pub mod errors;
pub mod export;
pub mod flatten;
pub mod flow;
pub mod gold;
pub mod mapping;
pub mod models;
pub mod silver;
pub mod state;
pub mod store;
pub mod tz;
