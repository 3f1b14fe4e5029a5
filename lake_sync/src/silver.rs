//! Silver layer: schema unification and last-write-wins merge.
//!
//! The normalizer reads Bronze rows newer than the entity's watermark,
//! reconciles them against the mapping catalog, deduplicates by natural key
//! (highest `ingested_at` wins; ties go to the later row in scan order) and
//! merges the winners into the Silver snapshot. A row whose attributes match
//! the stored version is left untouched, so provenance columns only move
//! when data actually changed and reruns over the same Bronze range are
//! no-ops.

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

use crate::errors::PipelineError;
use crate::mapping::MappingCatalog;
use crate::models::{
    COL_ENTITY_TYPE, COL_INGEST_DATE, COL_INGESTED_AT, COL_LAST_UPDATED_AT,
    COL_SOURCE_INGESTED_AT, EntityType, FieldValue, MergeResult, Record, natural_key,
};
use crate::store::{Layer, TableStore};
use crate::tz::{from_epoch_millis, to_epoch_millis};

const BOOKKEEPING: [&str; 5] = [
    COL_ENTITY_TYPE,
    COL_INGESTED_AT,
    COL_INGEST_DATE,
    COL_LAST_UPDATED_AT,
    COL_SOURCE_INGESTED_AT,
];

/// Maintains the canonical Silver tables.
#[derive(Debug, Clone)]
pub struct Normalizer {
    store: TableStore,
    mapping: MappingCatalog,
}

impl Normalizer {
    /// Creates a normalizer over `store` using `mapping` as the rule table.
    pub fn new(store: TableStore, mapping: MappingCatalog) -> Self {
        Normalizer { store, mapping }
    }

    /// Merges Bronze rows ingested after `since` into the entity's Silver
    /// table.
    ///
    /// The new snapshot is committed atomically, and only when at least one
    /// row was inserted or updated. On a commit failure the previous
    /// snapshot stays current and the same merge can simply be retried.
    pub fn normalize_and_merge(
        &self,
        entity: EntityType,
        since: Option<DateTime<Utc>>,
    ) -> Result<MergeResult, PipelineError> {
        let rules = self.mapping.for_entity(entity).ok_or_else(|| {
            PipelineError::SchemaViolation {
                entity: entity.code().to_string(),
                message: "no mapping rules declared for entity".to_string(),
            }
        })?;

        let since_ms = since.map(to_epoch_millis);
        let raw = self.store.read_bronze_since(entity, since_ms)?;

        let mut result = MergeResult {
            entity,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            skipped: 0,
            watermark: None,
        };
        if raw.is_empty() {
            debug!(entity = entity.code(), "no fresh bronze rows");
            return Ok(result);
        }

        let mut dropped_fields: IndexSet<String> = IndexSet::new();
        let mut winners: IndexMap<String, Record> = IndexMap::new();
        let mut max_ts: Option<i64> = None;

        for row in &raw {
            let (normalized, dropped) = rules.normalize_row(row);
            dropped_fields.extend(dropped);

            let Some(key) = natural_key(entity, &normalized) else {
                result.skipped += 1;
                continue;
            };

            let ts = normalized
                .get(COL_INGESTED_AT)
                .and_then(FieldValue::as_int)
                .unwrap_or(0);
            max_ts = Some(max_ts.map_or(ts, |m| m.max(ts)));

            match winners.get(&key) {
                Some(existing)
                    if existing
                        .get(COL_INGESTED_AT)
                        .and_then(FieldValue::as_int)
                        .unwrap_or(0)
                        > ts => {}
                _ => {
                    winners.insert(key, normalized);
                }
            }
        }
        if !dropped_fields.is_empty() {
            warn!(
                entity = entity.code(),
                fields = ?dropped_fields,
                "dropped unexpected upstream fields"
            );
        }
        if result.skipped > 0 {
            warn!(
                entity = entity.code(),
                skipped = result.skipped,
                "skipped rows with unresolved natural key"
            );
        }
        result.watermark = max_ts.and_then(from_epoch_millis);

        let current = self.store.read_current(Layer::Silver, entity)?;
        let mut index: IndexMap<String, usize> = current
            .iter()
            .enumerate()
            .filter_map(|(i, r)| natural_key(entity, r).map(|k| (k, i)))
            .collect();

        let now_ms = to_epoch_millis(Utc::now());
        let mut rows = current.clone();
        for (key, winner) in winners {
            let winner_ts = winner
                .get(COL_INGESTED_AT)
                .and_then(FieldValue::as_int)
                .unwrap_or(0);
            match index.get(&key) {
                Some(&i) if attrs_equal(&rows[i], &winner) => {
                    result.unchanged += 1;
                }
                Some(&i) => {
                    rows[i] = silver_row(winner, now_ms, winner_ts);
                    result.updated += 1;
                }
                None => {
                    index.insert(key, rows.len());
                    rows.push(silver_row(winner, now_ms, winner_ts));
                    result.inserted += 1;
                }
            }
        }

        if result.inserted + result.updated > 0 {
            let mut txn = self.store.begin(Layer::Silver, entity)?;
            txn.write_rows(rows);
            txn.commit().map_err(|source| PipelineError::MergeCommit {
                entity: entity.code().to_string(),
                source,
            })?;
        }

        info!(
            entity = entity.code(),
            inserted = result.inserted,
            updated = result.updated,
            unchanged = result.unchanged,
            skipped = result.skipped,
            "silver merge complete"
        );
        Ok(result)
    }
}

/// Shapes a merge winner into its stored Silver form: ingestion tags are
/// replaced by the change timestamp and the provenance link back to the
/// Bronze row that won.
fn silver_row(mut winner: Record, now_ms: i64, winner_ts: i64) -> Record {
    for col in [COL_INGESTED_AT, COL_INGEST_DATE, COL_ENTITY_TYPE] {
        winner.shift_remove(col);
    }
    winner.insert(COL_LAST_UPDATED_AT.to_string(), FieldValue::Int(now_ms));
    winner.insert(
        COL_SOURCE_INGESTED_AT.to_string(),
        FieldValue::Int(winner_ts),
    );
    winner
}

/// Attribute equality over the union of columns, bookkeeping excluded.
/// A column absent from one side compares as null.
fn attrs_equal(stored: &Record, incoming: &Record) -> bool {
    let mut cols: IndexSet<&str> = IndexSet::new();
    cols.extend(stored.keys().map(String::as_str));
    cols.extend(incoming.keys().map(String::as_str));
    cols.retain(|c| !BOOKKEEPING.contains(c));

    cols.iter().all(|c| {
        let a = stored.get(*c).unwrap_or(&FieldValue::Null);
        let b = incoming.get(*c).unwrap_or(&FieldValue::Null);
        a == b
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (TempDir, TableStore, Normalizer) {
        let tmp = TempDir::new().unwrap();
        let store = TableStore::new(tmp.path());
        let norm = Normalizer::new(store.clone(), MappingCatalog::builtin());
        (tmp, store, norm)
    }

    fn bronze_fixture(id: i64, status: &str, goals_home: i64, ingested_ms: i64) -> Record {
        let mut r = Record::new();
        r.insert("fixture.id".into(), FieldValue::Int(id));
        r.insert("fixture.status.short".into(), FieldValue::Str(status.into()));
        r.insert("goals.home".into(), FieldValue::Int(goals_home));
        r.insert("goals.away".into(), FieldValue::Int(0));
        r.insert("league.id".into(), FieldValue::Int(39));
        r.insert("league.season".into(), FieldValue::Int(2025));
        r.insert(COL_ENTITY_TYPE.into(), FieldValue::Str("fixtures".into()));
        r.insert(COL_INGESTED_AT.into(), FieldValue::Int(ingested_ms));
        r.insert(COL_INGEST_DATE.into(), FieldValue::Str("2025-08-22".into()));
        r
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 22).unwrap()
    }

    #[test]
    fn latest_ingest_wins_regardless_of_scan_order() {
        let (_tmp, store, norm) = setup();
        // The finished-match row arrives in the file before the stale
        // not-started row.
        store
            .append_bronze(
                EntityType::Fixture,
                day(),
                &[
                    bronze_fixture(100, "FT", 2, 2_000),
                    bronze_fixture(100, "NS", 0, 1_000),
                ],
            )
            .unwrap();

        let result = norm.normalize_and_merge(EntityType::Fixture, None).unwrap();
        assert_eq!(result.inserted, 1);

        let rows = store.read_current(Layer::Silver, EntityType::Fixture).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("status"), Some(&FieldValue::Str("FT".into())));
        assert_eq!(
            rows[0].get(COL_SOURCE_INGESTED_AT),
            Some(&FieldValue::Int(2_000))
        );
    }

    #[test]
    fn rerun_over_same_range_changes_nothing() {
        let (_tmp, store, norm) = setup();
        store
            .append_bronze(EntityType::Fixture, day(), &[bronze_fixture(100, "NS", 0, 1_000)])
            .unwrap();

        let first = norm.normalize_and_merge(EntityType::Fixture, None).unwrap();
        assert_eq!((first.inserted, first.updated), (1, 0));
        let v1 = store
            .current_version(Layer::Silver, EntityType::Fixture)
            .unwrap();

        let second = norm.normalize_and_merge(EntityType::Fixture, None).unwrap();
        assert_eq!((second.inserted, second.updated, second.unchanged), (0, 0, 1));
        // No new snapshot was committed.
        assert_eq!(
            store
                .current_version(Layer::Silver, EntityType::Fixture)
                .unwrap(),
            v1
        );
    }

    #[test]
    fn changed_attributes_update_in_place() {
        let (_tmp, store, norm) = setup();
        store
            .append_bronze(EntityType::Fixture, day(), &[bronze_fixture(100, "NS", 0, 1_000)])
            .unwrap();
        norm.normalize_and_merge(EntityType::Fixture, None).unwrap();

        store
            .append_bronze(EntityType::Fixture, day(), &[bronze_fixture(100, "FT", 3, 2_000)])
            .unwrap();
        let since = from_epoch_millis(1_000);
        let result = norm.normalize_and_merge(EntityType::Fixture, since).unwrap();
        assert_eq!((result.inserted, result.updated), (0, 1));
        assert_eq!(result.watermark, from_epoch_millis(2_000));

        let rows = store.read_current(Layer::Silver, EntityType::Fixture).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("goals_home"), Some(&FieldValue::Int(3)));
    }

    #[test]
    fn keyless_rows_are_skipped_not_fatal() {
        let (_tmp, store, norm) = setup();
        let mut keyless = bronze_fixture(100, "NS", 0, 1_000);
        keyless.insert("fixture.id".into(), FieldValue::Null);
        store
            .append_bronze(
                EntityType::Fixture,
                day(),
                &[keyless, bronze_fixture(101, "NS", 0, 1_000)],
            )
            .unwrap();

        let result = norm.normalize_and_merge(EntityType::Fixture, None).unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(result.inserted, 1);
    }
}
