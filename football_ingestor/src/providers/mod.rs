//! Provider abstraction for upstream sports-data sources.
//!
//! This module defines the [`SourceClient`] trait, which serves as a unified
//! interface for fetching semi-structured records from any sports-data
//! vendor (e.g., API-Football, a self-hosted mirror, a test stub).
//!
//! Each concrete provider implementation should implement [`SourceClient`]
//! to handle vendor-specific API logic, pagination and validation. The trait
//! is designed for async usage and supports dynamic dispatch
//! (`dyn SourceClient`) so the flow controller can select a provider at
//! runtime and tests can substitute canned data.

pub mod api_football;

use async_trait::async_trait;
use serde_json::Value;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{endpoint::Endpoint, fetch_params::FetchParams};

/// Trait for fetching semi-structured entity records from an upstream API.
///
/// Implementations must drain upstream pagination completely before
/// returning: callers treat the returned vector as the full result set for
/// the given parameters.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetches every record the upstream returns for `endpoint` + `params`.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Value>)` - one JSON object per upstream record, in upstream
    ///   order across all pages.
    /// * `Err(ProviderError)` - classified so callers can decide between
    ///   retrying (rate limits, transport) and aborting (auth).
    async fn fetch(
        &self,
        endpoint: Endpoint,
        params: &FetchParams,
    ) -> Result<Vec<Value>, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a [`SourceClient`] implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Transport {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The upstream rejected the request for quota reasons; retry later.
    #[snafu(display("Rate limited by upstream (retry after {retry_after_secs}s)"))]
    RateLimited {
        retry_after_secs: u64,
        backtrace: Backtrace,
    },

    /// The credentials were rejected. Not retryable.
    #[snafu(display("Authentication rejected: {message}"))]
    Auth {
        message: String,
        backtrace: Backtrace,
    },

    /// The provider's API returned a specific error message.
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The response body did not match the expected envelope shape.
    #[snafu(display("Unexpected response shape: {message}"))]
    Decode {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}

impl ProviderError {
    /// Whether the call may legitimately succeed on a later attempt.
    ///
    /// Transport failures and rate limits are transient; everything else is
    /// either a caller bug (validation), a schema problem (decode) or fatal
    /// (auth).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transport { .. } | ProviderError::RateLimited { .. }
        )
    }

    /// Backoff hint in seconds, when the upstream supplied one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct CannedClient;
    struct EmptyClient;

    #[async_trait]
    impl SourceClient for CannedClient {
        async fn fetch(
            &self,
            _endpoint: Endpoint,
            _params: &FetchParams,
        ) -> Result<Vec<Value>, ProviderError> {
            Ok(vec![json!({"fixture": {"id": 100}})])
        }
    }

    #[async_trait]
    impl SourceClient for EmptyClient {
        async fn fetch(
            &self,
            _endpoint: Endpoint,
            _params: &FetchParams,
        ) -> Result<Vec<Value>, ProviderError> {
            Ok(vec![])
        }
    }

    fn get_client(name: &str) -> Box<dyn SourceClient> {
        if name == "canned" {
            Box::new(CannedClient)
        } else {
            Box::new(EmptyClient)
        }
    }

    #[tokio::test]
    async fn dynamic_client_dispatch() {
        let client = get_client("canned");
        let rows = client
            .fetch(Endpoint::Fixtures, &FetchParams::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn retry_classification() {
        let rate = RateLimitedSnafu {
            retry_after_secs: 30u64,
        }
        .build();
        assert!(rate.is_retryable());
        assert_eq!(rate.retry_after_secs(), Some(30));

        let auth = AuthSnafu {
            message: "bad key".to_string(),
        }
        .build();
        assert!(!auth.is_retryable());
        assert_eq!(auth.retry_after_secs(), None);
    }
}
