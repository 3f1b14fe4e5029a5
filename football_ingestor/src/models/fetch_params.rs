use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::endpoint::Endpoint;

/// Universal parameters for one upstream fetch.
///
/// This struct is vendor-agnostic: every field maps onto a query parameter
/// of the sports API, and only the fields relevant to a given endpoint are
/// serialized. **Validation of required combinations is performed by each
/// provider implementation according to its own API rules** (for example,
/// API-Football rejects a bare `fixtures` call without a date, season+league
/// or id).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FetchParams {
    /// Calendar date filter (fixtures).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    /// Season year filter (fixtures, leagues, teams).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u16>,

    /// League id filter (fixtures, teams).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub league: Option<u32>,

    /// Single-object lookup by upstream id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Country name filter (leagues, teams).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// IANA timezone the upstream should render kickoff times in.
    /// The lake stores UTC, so providers default this to "UTC".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Escape hatch for upstream parameters the universal struct does not
    /// model. Keys/values are passed through verbatim.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

impl FetchParams {
    /// Parameters for a single day of fixtures, rendered in UTC.
    pub fn for_date(date: NaiveDate) -> Self {
        FetchParams {
            date: Some(date),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
    }

    /// Renders the populated fields as query pairs, in a stable order.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut q = Vec::new();
        if let Some(d) = self.date {
            q.push(("date".to_string(), d.format("%Y-%m-%d").to_string()));
        }
        if let Some(s) = self.season {
            q.push(("season".to_string(), s.to_string()));
        }
        if let Some(l) = self.league {
            q.push(("league".to_string(), l.to_string()));
        }
        if let Some(id) = self.id {
            q.push(("id".to_string(), id.to_string()));
        }
        if let Some(c) = &self.country {
            q.push(("country".to_string(), c.clone()));
        }
        if let Some(tz) = &self.timezone {
            q.push(("timezone".to_string(), tz.clone()));
        }
        for (k, v) in &self.extra {
            q.push((k.clone(), v.clone()));
        }
        q
    }

    /// True when no filter at all is set (dimension endpoints accept this;
    /// the fixtures endpoint does not).
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.season.is_none()
            && self.league.is_none()
            && self.id.is_none()
            && self.country.is_none()
            && self.extra.is_empty()
    }

    /// Returns a human-readable reason when the combination is invalid for
    /// `endpoint`, or `None` when acceptable.
    pub fn validate_for(&self, endpoint: Endpoint) -> Option<String> {
        match endpoint {
            Endpoint::Fixtures if self.is_empty() => Some(
                "fixtures requires at least one of: date, season+league, id".to_string(),
            ),
            Endpoint::Fixtures if self.season.is_some() && self.league.is_none() => {
                Some("fixtures by season also requires a league id".to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_follow_field_order() {
        let mut p = FetchParams::for_date(NaiveDate::from_ymd_opt(2025, 8, 22).unwrap());
        p.extra.insert("status".into(), "FT".into());
        assert_eq!(
            p.to_query(),
            vec![
                ("date".to_string(), "2025-08-22".to_string()),
                ("timezone".to_string(), "UTC".to_string()),
                ("status".to_string(), "FT".to_string()),
            ]
        );
    }

    #[test]
    fn bare_fixtures_request_is_rejected() {
        let p = FetchParams::default();
        assert!(p.validate_for(Endpoint::Fixtures).is_some());
        assert!(p.validate_for(Endpoint::Countries).is_none());
    }

    #[test]
    fn season_without_league_is_rejected_for_fixtures() {
        let p = FetchParams {
            season: Some(2025),
            ..Default::default()
        };
        assert!(p.validate_for(Endpoint::Fixtures).is_some());
        let ok = FetchParams {
            season: Some(2025),
            league: Some(39),
            ..Default::default()
        };
        assert!(ok.validate_for(Endpoint::Fixtures).is_none());
    }
}
