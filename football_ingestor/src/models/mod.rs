//! Vendor-agnostic request models.

pub mod endpoint;
pub mod fetch_params;
