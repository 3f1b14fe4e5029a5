//! Pipeline error taxonomy.
//!
//! The flow controller keys its retry/abort decisions off these variants:
//! [`PipelineError::RetryableFetch`] is retried with backoff up to a bounded
//! attempt count, [`PipelineError::Auth`] aborts the whole invocation, and
//! everything else fails only the entity being processed.

use football_ingestor::providers::ProviderError;
use thiserror::Error;

use crate::store::StoreError;

/// The unified error type for one entity's pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transient upstream failure (rate limit, timeout, transport).
    #[error("retryable fetch failure for {entity}: {message}")]
    RetryableFetch {
        /// Entity stream being fetched.
        entity: String,
        /// Upstream backoff hint, seconds, when supplied.
        retry_after_secs: Option<u64>,
        /// Diagnostic.
        message: String,
    },

    /// Credentials rejected. Fatal to the whole invocation.
    #[error("authentication failed: {message}")]
    Auth {
        /// Diagnostic from the upstream.
        message: String,
    },

    /// Non-retryable upstream failure that is not an auth problem
    /// (bad parameters, in-band API error).
    #[error("fetch failed for {entity}: {message}")]
    Fetch {
        /// Entity stream being fetched.
        entity: String,
        /// Diagnostic.
        message: String,
    },

    /// A batch (or mapping) did not match the expected schema; the batch is
    /// dropped and other entities continue.
    #[error("schema violation for {entity}: {message}")]
    SchemaViolation {
        /// Entity stream involved.
        entity: String,
        /// Diagnostic.
        message: String,
    },

    /// A Silver merge failed to commit; the table and watermark are left at
    /// their pre-merge state and the merge is safe to retry.
    #[error("merge commit failed for {entity}")]
    MergeCommit {
        /// Entity stream being merged.
        entity: String,
        /// Underlying table-store failure.
        #[source]
        source: StoreError,
    },

    /// Table-store failure outside a merge commit.
    #[error("table store error")]
    Store(#[from] StoreError),

    /// Watermark / run-log state store failure.
    #[error("state store error: {message}")]
    State {
        /// Diagnostic from the SQLite layer.
        message: String,
    },
}

impl PipelineError {
    /// Maps a terminal provider error onto the pipeline taxonomy.
    pub fn from_fetch(entity: &str, err: ProviderError) -> Self {
        match err {
            ProviderError::Auth { ref message, .. } => PipelineError::Auth {
                message: message.clone(),
            },
            ProviderError::Decode { ref message, .. } => PipelineError::SchemaViolation {
                entity: entity.to_string(),
                message: message.clone(),
            },
            ref e if e.is_retryable() => PipelineError::RetryableFetch {
                entity: entity.to_string(),
                retry_after_secs: e.retry_after_secs(),
                message: e.to_string(),
            },
            e => PipelineError::Fetch {
                entity: entity.to_string(),
                message: e.to_string(),
            },
        }
    }

    /// Wraps a state-store failure.
    pub fn state(err: anyhow::Error) -> Self {
        PipelineError::State {
            message: format!("{err:#}"),
        }
    }
}
