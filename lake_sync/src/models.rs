//! Core row and entity types shared by every lake layer.

use std::fmt;

use chrono::{DateTime, Utc};
use football_ingestor::models::endpoint::Endpoint;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column tagged onto every Bronze row: ingestion instant, epoch millis UTC.
pub const COL_INGESTED_AT: &str = "ingested_at";
/// Column tagged onto every Bronze row: partition key, `YYYY-MM-DD`.
pub const COL_INGEST_DATE: &str = "ingest_date";
/// Column tagged onto every Bronze row: the entity stream code.
pub const COL_ENTITY_TYPE: &str = "entity_type";
/// Silver bookkeeping: when the canonical row last changed, epoch millis.
pub const COL_LAST_UPDATED_AT: &str = "last_updated_at";
/// Silver bookkeeping: `ingested_at` of the Bronze row that produced the
/// current attribute values (provenance link).
pub const COL_SOURCE_INGESTED_AT: &str = "source_ingested_at";

/// The logical entity streams the lake tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Match fixtures (fact stream).
    Fixture,
    /// Leagues per season (dimension).
    League,
    /// Teams (dimension).
    Team,
    /// Countries (dimension).
    Country,
}

impl EntityType {
    /// Stable lowercase code; used for lake directories, the watermark store
    /// and configuration keys. Identical to the upstream endpoint code.
    pub fn code(&self) -> &'static str {
        self.endpoint().code()
    }

    /// The upstream endpoint this entity stream is fetched from.
    pub fn endpoint(&self) -> Endpoint {
        match self {
            EntityType::Fixture => Endpoint::Fixtures,
            EntityType::League => Endpoint::Leagues,
            EntityType::Team => Endpoint::Teams,
            EntityType::Country => Endpoint::Countries,
        }
    }

    /// All entities in dependency-friendly order (dimensions before facts).
    pub fn all() -> [EntityType; 4] {
        [
            EntityType::Country,
            EntityType::League,
            EntityType::Team,
            EntityType::Fixture,
        ]
    }

    /// Parses a stable code back into an entity type.
    pub fn parse(code: &str) -> Option<EntityType> {
        match Endpoint::parse(code)? {
            Endpoint::Fixtures => Some(EntityType::Fixture),
            Endpoint::Leagues => Some(EntityType::League),
            Endpoint::Teams => Some(EntityType::Team),
            Endpoint::Countries => Some(EntityType::Country),
        }
    }

    /// Canonical columns forming this entity's natural key.
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            EntityType::Fixture => &["fixture_id"],
            EntityType::League => &["league_id", "season"],
            EntityType::Team => &["team_id"],
            EntityType::Country => &["country_name"],
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One typed cell of a lake row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent / upstream null.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integral number.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// Text (also the carrier for serialized nested arrays).
    Str(String),
}

impl FieldValue {
    /// True for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Integer view; `Float` is not silently truncated.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float view; integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Text view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Renders any non-null value as text (used for composite keys and
    /// string coercion). `None` for nulls.
    pub fn render(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Bool(v) => Some(v.to_string()),
            FieldValue::Int(v) => Some(v.to_string()),
            FieldValue::Float(v) => Some(v.to_string()),
            FieldValue::Str(v) => Some(v.clone()),
        }
    }
}

/// One lake row: ordered column name → value map.
pub type Record = IndexMap<String, FieldValue>;

/// Renders the composite natural key of `record` for `entity`.
///
/// Returns `None` when any key column is missing or null — such rows cannot
/// be deduplicated and are skipped (and logged) by the normalizer.
pub fn natural_key(entity: EntityType, record: &Record) -> Option<String> {
    let mut parts = Vec::with_capacity(entity.key_columns().len());
    for col in entity.key_columns() {
        parts.push(record.get(*col)?.render()?);
    }
    Some(parts.join("|"))
}

/// Renders a composite key over arbitrary `key_cols` (table-store upserts).
pub fn composite_key(record: &Record, key_cols: &[&str]) -> Option<String> {
    let mut parts = Vec::with_capacity(key_cols.len());
    for col in key_cols {
        parts.push(record.get(*col)?.render()?);
    }
    Some(parts.join("|"))
}

/// One freshly ingested Bronze batch.
#[derive(Debug, Clone)]
pub struct RawBatch {
    /// Entity stream the batch belongs to.
    pub entity: EntityType,
    /// Ingestion instant stamped on every row.
    pub ingested_at: DateTime<Utc>,
    /// Bronze partition the batch landed in.
    pub partition_key: chrono::NaiveDate,
    /// The flattened, tagged rows.
    pub rows: Vec<Record>,
}

/// Outcome of one Silver merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    /// Entity stream that was merged.
    pub entity: EntityType,
    /// Natural keys inserted for the first time.
    pub inserted: usize,
    /// Existing keys whose attributes changed.
    pub updated: usize,
    /// Keys whose incoming attributes matched the stored row (no-op).
    pub unchanged: usize,
    /// Bronze rows skipped because their natural key did not resolve.
    pub skipped: usize,
    /// Highest `ingested_at` merged; `None` when no new Bronze rows existed.
    /// The caller persists this as the new watermark after commit.
    pub watermark: Option<DateTime<Utc>>,
}

/// Outcome of one Gold curation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuratedBatch {
    /// Rows emitted to Gold.
    pub emitted: usize,
    /// Fixture rows held back because a dimension reference did not resolve.
    pub held_back: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_codes_round_trip() {
        for e in EntityType::all() {
            assert_eq!(EntityType::parse(e.code()), Some(e));
        }
        assert!(EntityType::parse("standings").is_none());
    }

    #[test]
    fn natural_key_requires_every_column() {
        let mut rec = Record::new();
        rec.insert("league_id".into(), FieldValue::Int(39));
        assert_eq!(natural_key(EntityType::League, &rec), None);

        rec.insert("season".into(), FieldValue::Int(2025));
        assert_eq!(
            natural_key(EntityType::League, &rec),
            Some("39|2025".to_string())
        );

        rec.insert("season".into(), FieldValue::Null);
        assert_eq!(natural_key(EntityType::League, &rec), None);
    }
}
