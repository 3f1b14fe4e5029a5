//! API-Football (api-sports.io) REST implementation of [`SourceClient`].
//!
//! [`SourceClient`]: crate::providers::SourceClient

mod params;
mod provider;
mod response;

pub use provider::{ApiFootballClient, DEFAULT_BASE_URL};
pub use response::{ApiFootballResponse, Paging};
