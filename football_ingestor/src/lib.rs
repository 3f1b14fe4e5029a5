//! Source-client crate for the football data lake.
//!
//! This crate owns everything that talks to the upstream sports API:
//! the [`models::endpoint::Endpoint`] catalogue, universal
//! [`models::fetch_params::FetchParams`], the [`providers::SourceClient`]
//! trait, and the API-Football REST implementation with pagination and
//! rate-limit handling.
//!
//! The lake engine (`lake_sync`) consumes this crate only through the
//! `SourceClient` trait, so alternative upstreams can be swapped in for
//! tests or future vendors.

pub mod models;
pub mod providers;
