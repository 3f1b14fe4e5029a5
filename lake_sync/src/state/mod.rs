//! Pipeline state in SQLite: per-entity watermarks and the run log.
//!
//! This module provides:
//! - SQLite connection helpers: [`connection::connect_sqlite`] applies WAL,
//!   foreign_keys=ON, and a 5000ms busy_timeout.
//! - Embedded Diesel migrations and a runner: [`migrate::run_sqlite`].
//! - The [`WatermarkRepo`] trait and its SQLite implementation
//!   ([`repo::SqliteRepo`]).

pub mod connection;
pub mod migrate;
pub mod repo;
pub mod schema;

use chrono::{DateTime, Utc};

use crate::models::EntityType;

/// Result type used throughout the state repository for fallible operations.
pub type RepoResult<T> = anyhow::Result<T>;

/// One finished (or failed) entity run, as recorded in the run log.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// Entity stream the run processed.
    pub entity: EntityType,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// `succeeded`, `failed` or `skipped`.
    pub status: String,
    /// Silver keys inserted.
    pub inserted: usize,
    /// Silver keys updated.
    pub updated: usize,
    /// Silver keys left unchanged.
    pub unchanged: usize,
    /// Bronze rows skipped for an unresolved natural key.
    pub skipped: usize,
    /// Error rendering for failed runs.
    pub error: Option<String>,
}

/// Portable surface, SQLite implementation lives in `repo.rs`.
pub trait WatermarkRepo {
    /// The entity's persisted watermark, if a run has ever advanced it.
    fn get_watermark(
        &self,
        conn: &mut diesel::SqliteConnection,
        entity: EntityType,
    ) -> RepoResult<Option<DateTime<Utc>>>;

    /// Advances the entity's watermark to `candidate`, never backwards.
    /// Returns the effective stored value.
    fn set_watermark(
        &self,
        conn: &mut diesel::SqliteConnection,
        entity: EntityType,
        candidate: DateTime<Utc>,
    ) -> RepoResult<DateTime<Utc>>;

    /// Appends one run to the run log.
    fn record_run(&self, conn: &mut diesel::SqliteConnection, run: &RunRecord) -> RepoResult<()>;
}
