//! SQLite implementation of the watermark and run-log repository.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::models::EntityType;
use crate::state::schema::{entity_watermark, run_log};
use crate::state::{RepoResult, RunRecord, WatermarkRepo};
use crate::tz;

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = entity_watermark)]
struct WatermarkRow<'a> {
    entity_type: &'a str,
    watermark: &'a str,  // RFC3339 UTC
    updated_at: &'a str, // RFC3339 UTC
}

#[derive(Insertable, Debug)]
#[diesel(table_name = run_log)]
struct RunRow<'a> {
    entity_type: &'a str,
    started_at: &'a str,
    finished_at: &'a str,
    status: &'a str,
    inserted: i32,
    updated: i32,
    unchanged: i32,
    skipped: i32,
    error: Option<&'a str>,
}

/// Repository for pipeline state in a SQLite database.
pub struct SqliteRepo;

impl SqliteRepo {
    /// Creates the (stateless) repository handle.
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqliteRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkRepo for SqliteRepo {
    fn get_watermark(
        &self,
        conn: &mut SqliteConnection,
        entity: EntityType,
    ) -> RepoResult<Option<DateTime<Utc>>> {
        use crate::state::schema::entity_watermark::dsl as wm;

        let stored: Option<String> = wm::entity_watermark
            .filter(wm::entity_type.eq(entity.code()))
            .select(wm::watermark)
            .first::<String>(conn)
            .optional()?;

        stored.map(|s| tz::parse_ts_to_utc(&s)).transpose()
    }

    fn set_watermark(
        &self,
        conn: &mut SqliteConnection,
        entity: EntityType,
        candidate: DateTime<Utc>,
    ) -> RepoResult<DateTime<Utc>> {
        use crate::state::schema::entity_watermark::dsl as wm;

        conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
            let stored: Option<String> = wm::entity_watermark
                .filter(wm::entity_type.eq(entity.code()))
                .select(wm::watermark)
                .first::<String>(conn)
                .optional()?;

            // Watermarks never move backwards.
            if let Some(existing) = stored.map(|s| tz::parse_ts_to_utc(&s)).transpose()? {
                if existing >= candidate {
                    return Ok(existing);
                }
            }

            let watermark_rfc3339 = tz::to_rfc3339_millis(candidate);
            let updated_rfc3339 = tz::to_rfc3339_millis(Utc::now());
            let row = WatermarkRow {
                entity_type: entity.code(),
                watermark: &watermark_rfc3339,
                updated_at: &updated_rfc3339,
            };

            diesel::insert_into(wm::entity_watermark)
                .values(&row)
                .on_conflict(wm::entity_type)
                .do_update()
                .set(&row)
                .execute(conn)?;

            Ok(candidate)
        })
    }

    fn record_run(&self, conn: &mut SqliteConnection, run: &RunRecord) -> RepoResult<()> {
        use crate::state::schema::run_log::dsl as rl;

        let started_rfc3339 = tz::to_rfc3339_millis(run.started_at);
        let finished_rfc3339 = tz::to_rfc3339_millis(run.finished_at);
        let row = RunRow {
            entity_type: run.entity.code(),
            started_at: &started_rfc3339,
            finished_at: &finished_rfc3339,
            status: &run.status,
            inserted: run.inserted as i32,
            updated: run.updated as i32,
            unchanged: run.unchanged as i32,
            skipped: run.skipped as i32,
            error: run.error.as_deref(),
        };

        diesel::insert_into(rl::run_log).values(&row).execute(conn)?;
        Ok(())
    }
}
