use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use shared_utils::env::get_env_var;
use snafu::ResultExt;

use crate::{
    models::{endpoint::Endpoint, fetch_params::FetchParams},
    providers::{
        ApiSnafu, AuthSnafu, ClientBuildSnafu, DecodeSnafu, InvalidApiKeySnafu,
        MissingEnvVarSnafu, ProviderError, ProviderInitError, RateLimitedSnafu, SourceClient,
        TransportSnafu,
        api_football::{params::construct_params, response::ApiFootballResponse},
    },
};

/// Hosted API-Football v3 base URL.
pub const DEFAULT_BASE_URL: &str = "https://v3.football.api-sports.io";

/// Environment variable the API key is read from.
const API_KEY_VAR: &str = "API_FOOTBALL_KEY";

/// Fallback backoff hint when a 429 carries no `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// REST client for the API-Football service.
///
/// Holds a reqwest client with the `x-apisports-key` header pre-installed
/// and a direct rate limiter sized to the account's per-minute quota. Every
/// page request awaits the limiter first, so a full pagination drain never
/// bursts past the plan limit.
pub struct ApiFootballClient {
    client: Client,
    base_url: String,
    limiter: DefaultDirectRateLimiter,
    _api_key: SecretString,
}

impl ApiFootballClient {
    /// Creates a client for `base_url` with an explicit key and per-minute
    /// request quota.
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        requests_per_minute: NonZeroU32,
    ) -> Result<Self, ProviderInitError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "x-apisports-key",
            header::HeaderValue::from_str(api_key.expose_secret())
                .context(InvalidApiKeySnafu)?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            limiter: RateLimiter::direct(Quota::per_minute(requests_per_minute)),
            _api_key: api_key,
        })
    }

    /// Creates a client against the hosted service, reading the API key from
    /// the `API_FOOTBALL_KEY` environment variable.
    ///
    /// The default quota matches the free plan (10 requests/minute); callers
    /// on a paid plan should use [`ApiFootballClient::new`].
    pub fn from_env() -> Result<Self, ProviderInitError> {
        let api_key = SecretString::new(get_env_var(API_KEY_VAR).context(MissingEnvVarSnafu)?.into());
        Self::new(DEFAULT_BASE_URL, api_key, nonzero!(10u32))
    }

    /// Like [`ApiFootballClient::from_env`], but with an explicit base URL,
    /// key variable name and quota (deployment configuration).
    pub fn from_env_with(
        base_url: &str,
        key_env: &str,
        requests_per_minute: NonZeroU32,
    ) -> Result<Self, ProviderInitError> {
        let api_key = SecretString::new(get_env_var(key_env).context(MissingEnvVarSnafu)?.into());
        Self::new(base_url, api_key, requests_per_minute)
    }

    /// Issues one page request and decodes the envelope.
    async fn fetch_page(
        &self,
        endpoint: Endpoint,
        query: &[(String, String)],
        page: u32,
    ) -> Result<ApiFootballResponse, ProviderError> {
        self.limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url, endpoint.code());
        let mut request = self.client.get(&url).query(query);
        if page > 1 {
            request = request.query(&[("page", page.to_string())]);
        }

        let response = request.send().await.context(TransportSnafu)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            return AuthSnafu { message }.fail();
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return RateLimitedSnafu { retry_after_secs }.fail();
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return ApiSnafu { message }.fail();
        }

        let envelope = response
            .json::<ApiFootballResponse>()
            .await
            .map_err(|e| DecodeSnafu { message: e.to_string() }.build())?;

        if let Some((message, is_auth, is_quota)) = envelope.error_message() {
            if is_auth {
                return AuthSnafu { message }.fail();
            }
            if is_quota {
                return RateLimitedSnafu {
                    retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
                }
                .fail();
            }
            return ApiSnafu { message }.fail();
        }

        Ok(envelope)
    }
}

#[async_trait]
impl SourceClient for ApiFootballClient {
    async fn fetch(
        &self,
        endpoint: Endpoint,
        params: &FetchParams,
    ) -> Result<Vec<Value>, ProviderError> {
        let query = construct_params(endpoint, params)?;

        let mut records: Vec<Value> = Vec::new();
        let mut page: u32 = 1;

        // Drain every page before returning; the merge layer relies on the
        // result set being complete for the given parameters.
        loop {
            let envelope = self.fetch_page(endpoint, &query, page).await?;
            records.extend(envelope.response);

            let paging = envelope.paging;
            if paging.total > paging.current && paging.current > 0 {
                page = paging.current + 1;
            } else {
                break;
            }
        }

        tracing::debug!(
            endpoint = %endpoint,
            records = records.len(),
            pages = page,
            "fetched upstream records"
        );

        Ok(records)
    }
}
