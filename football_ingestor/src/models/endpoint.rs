use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical upstream endpoints the pipeline knows how to fetch.
///
/// Each variant maps to one REST path of the sports API and to one entity
/// stream in the lake. The string codes are stable: they are used in
/// configuration files, CLI arguments and lake directory names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// Match fixtures (the fact stream).
    Fixtures,
    /// League and season dimension.
    Leagues,
    /// Team dimension.
    Teams,
    /// Country dimension.
    Countries,
}

impl Endpoint {
    /// Stable lowercase code (also the REST path segment).
    pub fn code(&self) -> &'static str {
        match self {
            Endpoint::Fixtures => "fixtures",
            Endpoint::Leagues => "leagues",
            Endpoint::Teams => "teams",
            Endpoint::Countries => "countries",
        }
    }

    /// All endpoints in the default processing order (dimensions first, so
    /// fixture curation can resolve them within a single invocation).
    pub fn all() -> [Endpoint; 4] {
        [
            Endpoint::Countries,
            Endpoint::Leagues,
            Endpoint::Teams,
            Endpoint::Fixtures,
        ]
    }

    /// Parses a stable code back into an endpoint.
    pub fn parse(code: &str) -> Option<Endpoint> {
        match code.trim().to_ascii_lowercase().as_str() {
            "fixtures" => Some(Endpoint::Fixtures),
            "leagues" => Some(Endpoint::Leagues),
            "teams" => Some(Endpoint::Teams),
            "countries" => Some(Endpoint::Countries),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
