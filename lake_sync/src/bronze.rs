//! Bronze layer: raw payload landing.
//!
//! Every fetched payload is flattened and appended verbatim (plus
//! bookkeeping columns) under the ingest date's partition. Nothing here is
//! ever updated or deleted; Silver can always be rebuilt from Bronze alone.

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::errors::PipelineError;
use crate::flatten::flatten_record;
use crate::models::{
    COL_ENTITY_TYPE, COL_INGEST_DATE, COL_INGESTED_AT, EntityType, FieldValue, RawBatch, Record,
};
use crate::store::TableStore;
use crate::tz::to_epoch_millis;

/// Writes raw API payloads into the Bronze layer.
#[derive(Debug, Clone)]
pub struct RawIngestor {
    store: TableStore,
}

impl RawIngestor {
    /// Creates an ingestor over `store`.
    pub fn new(store: TableStore) -> Self {
        RawIngestor { store }
    }

    /// Flattens and lands one batch of payloads.
    ///
    /// The batch is all-or-nothing: if any payload fails to flatten, nothing
    /// is written and the whole batch is rejected as a schema violation. An
    /// empty payload list is a valid no-op batch.
    pub fn ingest(
        &self,
        entity: EntityType,
        payloads: &[Value],
    ) -> Result<RawBatch, PipelineError> {
        let ingested_at = Utc::now();
        let ingested_ms = to_epoch_millis(ingested_at);
        let partition_key = ingested_at.date_naive();
        let partition_str = partition_key.format("%Y-%m-%d").to_string();

        let mut rows: Vec<Record> = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let mut row =
                flatten_record(payload).map_err(|e| PipelineError::SchemaViolation {
                    entity: entity.code().to_string(),
                    message: e.to_string(),
                })?;
            row.insert(
                COL_ENTITY_TYPE.to_string(),
                FieldValue::Str(entity.code().to_string()),
            );
            row.insert(COL_INGESTED_AT.to_string(), FieldValue::Int(ingested_ms));
            row.insert(
                COL_INGEST_DATE.to_string(),
                FieldValue::Str(partition_str.clone()),
            );
            rows.push(row);
        }

        let path = self.store.append_bronze(entity, partition_key, &rows)?;
        info!(
            entity = entity.code(),
            rows = rows.len(),
            partition = %partition_str,
            path = ?path,
            "bronze batch landed"
        );

        Ok(RawBatch {
            entity,
            ingested_at,
            partition_key,
            rows,
        })
    }
}
