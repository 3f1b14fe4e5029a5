//! Run orchestration: fetch → Bronze → Silver merge → Gold, per entity.
//!
//! Entities run in dependency-friendly order (dimensions before fixtures).
//! Retryable fetch failures back off exponentially, honoring an upstream
//! `Retry-After` hint when one was sent, up to the configured attempt
//! budget. An authentication failure aborts the whole invocation since no
//! later fetch can succeed with the same credentials; every other failure
//! is contained to its entity. Each entity's outcome lands in the run log.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use diesel::SqliteConnection;
use football_ingestor::models::fetch_params::FetchParams;
use football_ingestor::providers::SourceClient;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::bronze::RawIngestor;
use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::gold::Curator;
use crate::mapping::MappingCatalog;
use crate::models::{CuratedBatch, EntityType, MergeResult};
use crate::silver::Normalizer;
use crate::state::connection::connect_sqlite;
use crate::state::repo::SqliteRepo;
use crate::state::{RunRecord, WatermarkRepo};
use crate::store::TableStore;

/// Terminal state of one entity within a run.
#[derive(Debug, Clone)]
pub enum RunStatus {
    /// Merge and curation completed.
    Succeeded {
        /// Silver merge outcome.
        merge: MergeResult,
        /// Gold curation outcome.
        curated: CuratedBatch,
    },
    /// The entity's pipeline failed; other entities may still have run.
    Failed {
        /// Rendered error.
        error: String,
    },
    /// Not attempted (an earlier auth failure aborted the invocation).
    Skipped,
}

/// Per-entity outcome of one invocation.
#[derive(Debug, Clone)]
pub struct EntityRunReport {
    /// Entity stream.
    pub entity: EntityType,
    /// What happened.
    pub status: RunStatus,
}

/// Drives the full pipeline for a set of entities.
pub struct FlowController {
    config: PipelineConfig,
    client: Arc<dyn SourceClient>,
    ingestor: RawIngestor,
    normalizer: Normalizer,
    curator: Curator,
    repo: SqliteRepo,
}

impl FlowController {
    /// Wires the pipeline components from configuration. `client` is the
    /// upstream source; injectable so tests can run against canned payloads.
    pub fn new(config: PipelineConfig, client: Arc<dyn SourceClient>) -> anyhow::Result<Self> {
        let store = TableStore::new(&config.lake_root);
        let mapping: MappingCatalog = config.mapping()?;
        Ok(FlowController {
            ingestor: RawIngestor::new(store.clone()),
            normalizer: Normalizer::new(store.clone(), mapping),
            curator: Curator::new(store),
            repo: SqliteRepo::new(),
            config,
            client,
        })
    }

    /// Runs the pipeline for `entities`, in the given order.
    pub async fn run(&self, entities: &[EntityType]) -> anyhow::Result<Vec<EntityRunReport>> {
        let db_url = self.config.state_db.to_string_lossy().to_string();
        let mut conn = connect_sqlite(&db_url)?;

        let mut reports = Vec::with_capacity(entities.len());
        let mut aborted = false;
        for &entity in entities {
            let started_at = Utc::now();
            if aborted {
                self.log_run(&mut conn, entity, started_at, "skipped", None, None);
                reports.push(EntityRunReport {
                    entity,
                    status: RunStatus::Skipped,
                });
                continue;
            }

            match self.run_entity(&mut conn, entity).await {
                Ok((merge, curated)) => {
                    self.log_run(&mut conn, entity, started_at, "succeeded", Some(&merge), None);
                    info!(entity = entity.code(), "entity run succeeded");
                    reports.push(EntityRunReport {
                        entity,
                        status: RunStatus::Succeeded { merge, curated },
                    });
                }
                Err(err) => {
                    let rendered = err.to_string();
                    self.log_run(&mut conn, entity, started_at, "failed", None, Some(&rendered));
                    error!(entity = entity.code(), error = %rendered, "entity run failed");
                    if matches!(err, PipelineError::Auth { .. }) {
                        // No later fetch can succeed with rejected credentials.
                        aborted = true;
                    }
                    reports.push(EntityRunReport {
                        entity,
                        status: RunStatus::Failed { error: rendered },
                    });
                }
            }
        }
        Ok(reports)
    }

    async fn run_entity(
        &self,
        conn: &mut SqliteConnection,
        entity: EntityType,
    ) -> Result<(MergeResult, CuratedBatch), PipelineError> {
        let params = self.fetch_params(entity);
        let payloads = self.fetch_with_retry(entity, &params).await?;
        self.ingestor.ingest(entity, &payloads)?;

        let since = self
            .repo
            .get_watermark(conn, entity)
            .map_err(PipelineError::state)?;
        let merge = self.normalizer.normalize_and_merge(entity, since)?;

        if let Some(watermark) = merge.watermark {
            // The merge itself already committed and is idempotent, so a
            // failed watermark write only costs a re-read next run.
            if let Err(err) = self.repo.set_watermark(conn, entity, watermark) {
                warn!(entity = entity.code(), error = %format!("{err:#}"), "watermark persist failed");
            }
        }

        let curated = self.curator.curate(entity)?;
        Ok((merge, curated))
    }

    /// Configured parameters for the entity; fixtures default to yesterday's
    /// UTC date, dimensions to an unfiltered fetch.
    fn fetch_params(&self, entity: EntityType) -> FetchParams {
        if let Some(params) = self.config.params_for(entity) {
            return params.clone();
        }
        match entity {
            EntityType::Fixture => {
                let yesterday = Utc::now().date_naive() - Days::new(1);
                FetchParams::for_date(yesterday)
            }
            _ => FetchParams::default(),
        }
    }

    async fn fetch_with_retry(
        &self,
        entity: EntityType,
        params: &FetchParams,
    ) -> Result<Vec<Value>, PipelineError> {
        let max_attempts = self.config.retry.max_attempts;
        let mut attempt = 1u32;
        loop {
            match self.client.fetch(entity.endpoint(), params).await {
                Ok(payloads) => return Ok(payloads),
                Err(err) => {
                    let err = PipelineError::from_fetch(entity.code(), err);
                    let PipelineError::RetryableFetch {
                        retry_after_secs, ..
                    } = &err
                    else {
                        return Err(err);
                    };
                    if attempt >= max_attempts {
                        return Err(err);
                    }

                    let backoff = backoff_delay(self.config.retry.base_delay_ms, attempt);
                    let delay = match retry_after_secs {
                        Some(hint) => backoff.max(Duration::from_secs(*hint)),
                        None => backoff,
                    };
                    warn!(
                        entity = entity.code(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retryable fetch failure, backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn log_run(
        &self,
        conn: &mut SqliteConnection,
        entity: EntityType,
        started_at: chrono::DateTime<Utc>,
        status: &str,
        merge: Option<&MergeResult>,
        error: Option<&str>,
    ) {
        let record = RunRecord {
            entity,
            started_at,
            finished_at: Utc::now(),
            status: status.to_string(),
            inserted: merge.map_or(0, |m| m.inserted),
            updated: merge.map_or(0, |m| m.updated),
            unchanged: merge.map_or(0, |m| m.unchanged),
            skipped: merge.map_or(0, |m| m.skipped),
            error: error.map(str::to_string),
        };
        if let Err(err) = self.repo.record_run(conn, &record) {
            warn!(entity = entity.code(), error = %format!("{err:#}"), "run log write failed");
        }
    }
}

/// Exponential backoff for the given 1-based attempt, saturating so an
/// oversized attempt budget can never overflow the shift or the multiply.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}
