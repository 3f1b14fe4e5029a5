use crate::{
    models::{endpoint::Endpoint, fetch_params::FetchParams},
    providers::{ProviderError, ValidationSnafu},
};

/// Validates the universal params against API-Football's rules and renders
/// them as query pairs.
pub fn construct_params(
    endpoint: Endpoint,
    params: &FetchParams,
) -> Result<Vec<(String, String)>, ProviderError> {
    if let Some(reason) = params.validate_for(endpoint) {
        return ValidationSnafu { message: reason }.fail();
    }
    Ok(params.to_query())
}
