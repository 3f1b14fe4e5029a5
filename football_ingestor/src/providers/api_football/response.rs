use serde::Deserialize;
use serde_json::Value;

/// Pagination block of the API-Football envelope.
#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub struct Paging {
    /// 1-based index of the page this envelope carries.
    #[serde(default)]
    pub current: u32,
    /// Total number of pages for the query.
    #[serde(default)]
    pub total: u32,
}

/// Response envelope shared by every API-Football endpoint.
///
/// The upstream reports failures in-band: `errors` is an empty array on
/// success and an object of `{field: message}` pairs on failure, while the
/// HTTP status stays 200. [`ApiFootballResponse::error_message`] folds that
/// quirk into something callers can classify.
#[derive(Deserialize, Debug)]
pub struct ApiFootballResponse {
    /// In-band error report; `[]` when the call succeeded.
    #[serde(default)]
    pub errors: Value,
    /// Number of records in `response`.
    #[serde(default)]
    pub results: u64,
    /// Pagination state.
    #[serde(default)]
    pub paging: Paging,
    /// The actual records, one semi-structured object each.
    #[serde(default)]
    pub response: Vec<Value>,
}

impl ApiFootballResponse {
    /// Extracts the in-band error report, if any.
    ///
    /// Returns `(message, is_auth, is_quota)` so the provider can map the
    /// failure onto the right [`ProviderError`](crate::providers::ProviderError)
    /// variant.
    pub fn error_message(&self) -> Option<(String, bool, bool)> {
        let non_empty = match &self.errors {
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Null => false,
            other => return Some((other.to_string(), false, false)),
        };
        if !non_empty {
            return None;
        }
        let message = self.errors.to_string();
        let lower = message.to_ascii_lowercase();
        let is_auth = lower.contains("token") || lower.contains("key");
        let is_quota = lower.contains("request") || lower.contains("rate");
        Some((message, is_auth, is_quota))
    }
}
