//! Declarative field-mapping catalog (Bronze → Silver schema reconciliation).
//!
//! Upstream API fields occasionally change shape across time (renames, new
//! fields, dropped fields). Rather than poking at whatever keys happen to be
//! present, the normalizer consults this rule table: each canonical Silver
//! column declares the upstream names it accepts (current dotted name plus
//! historical aliases) and an optional type coercion. Unexpected fields are
//! dropped and reported to the caller for logging — never silently
//! propagated.
//!
//! The catalog ships with a built-in default ([`MappingCatalog::builtin`])
//! and can be overridden from TOML:
//!
//! ```toml
//! [entities.fixtures]
//!   [[entities.fixtures.columns]]
//!   name   = "fixture_id"
//!   source = ["fixture.id", "fixture_id"]
//!   coerce = "int"
//! ```

use std::path::Path;

use anyhow::{Context, bail};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::models::{
    COL_ENTITY_TYPE, COL_INGEST_DATE, COL_INGESTED_AT, EntityType, FieldValue, Record,
};

/// Target type of a coercion rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// Integral; numeric text parses, empty text is null.
    Int,
    /// Floating point; integers widen, numeric text parses, empty is null.
    Float,
    /// Text; any non-null value renders.
    Str,
    /// Boolean; accepts `true`/`false` text.
    Bool,
}

impl Coercion {
    /// Applies the coercion. Unconvertible non-null values become null —
    /// the row survives, the cell does not.
    pub fn apply(&self, value: &FieldValue) -> FieldValue {
        match (self, value) {
            (_, FieldValue::Null) => FieldValue::Null,
            (Coercion::Int, FieldValue::Int(v)) => FieldValue::Int(*v),
            (Coercion::Int, FieldValue::Bool(b)) => FieldValue::Int(i64::from(*b)),
            (Coercion::Int, FieldValue::Float(f)) if f.fract() == 0.0 => {
                FieldValue::Int(*f as i64)
            }
            (Coercion::Int, FieldValue::Str(s)) => match s.trim() {
                "" => FieldValue::Null,
                t => t.parse::<i64>().map(FieldValue::Int).unwrap_or(FieldValue::Null),
            },
            (Coercion::Float, FieldValue::Float(f)) => FieldValue::Float(*f),
            (Coercion::Float, FieldValue::Int(v)) => FieldValue::Float(*v as f64),
            (Coercion::Float, FieldValue::Str(s)) => match s.trim() {
                "" => FieldValue::Null,
                t => t
                    .parse::<f64>()
                    .map(FieldValue::Float)
                    .unwrap_or(FieldValue::Null),
            },
            (Coercion::Str, v) => v.render().map(FieldValue::Str).unwrap_or(FieldValue::Null),
            (Coercion::Bool, FieldValue::Bool(b)) => FieldValue::Bool(*b),
            (Coercion::Bool, FieldValue::Str(s)) => match s.trim() {
                "true" => FieldValue::Bool(true),
                "false" => FieldValue::Bool(false),
                _ => FieldValue::Null,
            },
            _ => FieldValue::Null,
        }
    }
}

/// One canonical Silver column and the upstream names it accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    /// Canonical column name.
    pub name: String,
    /// Accepted upstream (dotted) names, first match wins. The canonical
    /// name itself is always accepted, so already-normalized rows re-map
    /// cleanly.
    #[serde(default)]
    pub source: Vec<String>,
    /// Optional type coercion applied after the rename.
    #[serde(default)]
    pub coerce: Option<Coercion>,
}

impl ColumnSpec {
    fn new(name: &str, source: &[&str], coerce: Option<Coercion>) -> Self {
        ColumnSpec {
            name: name.to_string(),
            source: source.iter().map(|s| s.to_string()).collect(),
            coerce,
        }
    }
}

/// Mapping rules for one entity stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityMapping {
    /// Canonical columns in output order.
    pub columns: Vec<ColumnSpec>,
}

impl EntityMapping {
    /// Applies the rule table to one flattened Bronze row.
    ///
    /// Returns the canonical row (columns in spec order; bookkeeping columns
    /// pass through untouched) plus the list of upstream fields that no rule
    /// consumed — the caller logs and drops them.
    pub fn normalize_row(&self, raw: &Record) -> (Record, Vec<String>) {
        let mut consumed: IndexSet<&str> = IndexSet::new();
        let mut out = Record::new();

        for spec in &self.columns {
            let mut value = FieldValue::Null;
            let found = spec
                .source
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(spec.name.as_str()))
                .find(|name| raw.contains_key(*name));
            if let Some(name) = found {
                consumed.insert(name);
                value = raw[name].clone();
            }
            if let Some(coerce) = spec.coerce {
                value = coerce.apply(&value);
            }
            out.insert(spec.name.clone(), value);
        }

        // Bookkeeping columns are not part of the entity schema but must
        // survive normalization.
        for col in [COL_ENTITY_TYPE, COL_INGESTED_AT, COL_INGEST_DATE] {
            if let Some(v) = raw.get(col) {
                out.insert(col.to_string(), v.clone());
                consumed.insert(col);
            }
        }

        let dropped = raw
            .keys()
            .filter(|k| !consumed.contains(k.as_str()))
            .cloned()
            .collect();
        (out, dropped)
    }
}

/// The full per-entity rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingCatalog {
    /// Entity code → mapping rules.
    pub entities: IndexMap<String, EntityMapping>,
}

/// Summary of catalog validation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MappingReport {
    /// Total canonical columns across entities.
    pub columns: usize,
    /// Total source aliases across columns.
    pub aliases: usize,
}

impl MappingCatalog {
    /// Rules for one entity, if declared.
    pub fn for_entity(&self, entity: EntityType) -> Option<&EntityMapping> {
        self.entities.get(entity.code())
    }

    /// Parses and validates a TOML catalog.
    pub fn load_str(s: &str) -> anyhow::Result<Self> {
        let cat: MappingCatalog = toml::from_str(s).context("parse mapping catalog TOML")?;
        cat.validate()?;
        Ok(cat)
    }

    /// Reads and validates a TOML catalog from disk.
    pub fn load_path(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read mapping catalog {}", path.display()))?;
        Self::load_str(&s)
    }

    /// Checks structural invariants: known entity codes, non-empty unique
    /// canonical names, no alias claimed by two columns of one entity, and
    /// every natural-key column present.
    pub fn validate(&self) -> anyhow::Result<MappingReport> {
        let mut report = MappingReport::default();
        for (code, em) in &self.entities {
            let Some(entity) = EntityType::parse(code) else {
                bail!("unknown entity code in mapping catalog: {code}");
            };
            let mut names: IndexSet<&str> = IndexSet::new();
            let mut sources: IndexSet<&str> = IndexSet::new();
            for spec in &em.columns {
                if spec.name.trim().is_empty() {
                    bail!("empty column name in mapping for {code}");
                }
                if !names.insert(spec.name.as_str()) {
                    bail!("duplicate column {} in mapping for {code}", spec.name);
                }
                for src in &spec.source {
                    if src.trim().is_empty() {
                        bail!("empty source alias for {}.{}", code, spec.name);
                    }
                    if !sources.insert(src.as_str()) {
                        bail!("source alias {src} claimed twice in mapping for {code}");
                    }
                    report.aliases += 1;
                }
                report.columns += 1;
            }
            for key_col in entity.key_columns() {
                if !names.contains(key_col) {
                    bail!("mapping for {code} is missing natural-key column {key_col}");
                }
            }
        }
        Ok(report)
    }

    /// The built-in catalog for the four API-Football entity streams.
    ///
    /// Aliases cover the v2 → v3 upstream renames the lake has seen
    /// (`fixture_id` → `fixture.id`, `statusShort` → `fixture.status.short`,
    /// `event_date` → `fixture.date`).
    pub fn builtin() -> Self {
        use Coercion::*;

        let fixtures = EntityMapping {
            columns: vec![
                ColumnSpec::new("fixture_id", &["fixture.id", "fixture_id"], Some(Int)),
                ColumnSpec::new("event_date", &["fixture.date", "event_date"], Some(Str)),
                ColumnSpec::new(
                    "status",
                    &["fixture.status.short", "statusShort"],
                    Some(Str),
                ),
                ColumnSpec::new("referee", &["fixture.referee"], Some(Str)),
                ColumnSpec::new("venue_name", &["fixture.venue.name", "venue"], Some(Str)),
                ColumnSpec::new("league_id", &["league.id"], Some(Int)),
                ColumnSpec::new("league_name", &["league.name"], Some(Str)),
                ColumnSpec::new("season", &["league.season"], Some(Int)),
                ColumnSpec::new("round", &["league.round"], Some(Str)),
                ColumnSpec::new("teams_home_id", &["teams.home.id", "homeTeam.team_id"], Some(Int)),
                ColumnSpec::new(
                    "teams_home_name",
                    &["teams.home.name", "homeTeam.team_name"],
                    Some(Str),
                ),
                ColumnSpec::new("teams_away_id", &["teams.away.id", "awayTeam.team_id"], Some(Int)),
                ColumnSpec::new(
                    "teams_away_name",
                    &["teams.away.name", "awayTeam.team_name"],
                    Some(Str),
                ),
                ColumnSpec::new("goals_home", &["goals.home", "goalsHomeTeam"], Some(Int)),
                ColumnSpec::new("goals_away", &["goals.away", "goalsAwayTeam"], Some(Int)),
                // Score columns arrive empty from the API until a match
                // reaches extra time; they stay float for schema stability.
                ColumnSpec::new("score_extratime_home", &["score.extratime.home"], Some(Float)),
                ColumnSpec::new("score_extratime_away", &["score.extratime.away"], Some(Float)),
                ColumnSpec::new("score_penalty_home", &["score.penalty.home"], Some(Float)),
                ColumnSpec::new("score_penalty_away", &["score.penalty.away"], Some(Float)),
            ],
        };

        let leagues = EntityMapping {
            columns: vec![
                ColumnSpec::new("league_id", &["league.id", "league_id"], Some(Int)),
                ColumnSpec::new("league_name", &["league.name", "name"], Some(Str)),
                ColumnSpec::new("league_type", &["league.type", "type"], Some(Str)),
                ColumnSpec::new("country_name", &["country.name", "country"], Some(Str)),
                ColumnSpec::new("country_code", &["country.code"], Some(Str)),
                // Dimension fetches are per season, so the upstream
                // `seasons` array carries one element (see flatten).
                ColumnSpec::new("season", &["seasons.year", "season"], Some(Int)),
                ColumnSpec::new("season_start", &["seasons.start"], Some(Str)),
                ColumnSpec::new("season_end", &["seasons.end"], Some(Str)),
                ColumnSpec::new("season_current", &["seasons.current"], Some(Bool)),
            ],
        };

        let teams = EntityMapping {
            columns: vec![
                ColumnSpec::new("team_id", &["team.id", "team_id"], Some(Int)),
                ColumnSpec::new("team_name", &["team.name", "name"], Some(Str)),
                ColumnSpec::new("team_code", &["team.code", "code"], Some(Str)),
                ColumnSpec::new("team_country", &["team.country", "country"], Some(Str)),
                ColumnSpec::new("founded", &["team.founded", "founded"], Some(Int)),
                ColumnSpec::new("venue_name", &["venue.name"], Some(Str)),
                ColumnSpec::new("venue_city", &["venue.city"], Some(Str)),
            ],
        };

        let countries = EntityMapping {
            columns: vec![
                ColumnSpec::new("country_name", &["name"], Some(Str)),
                ColumnSpec::new("country_code", &["code"], Some(Str)),
                ColumnSpec::new("flag", &["flag"], Some(Str)),
            ],
        };

        let mut entities = IndexMap::new();
        entities.insert("fixtures".to_string(), fixtures);
        entities.insert("leagues".to_string(), leagues);
        entities.insert("teams".to_string(), teams);
        entities.insert("countries".to_string(), countries);
        MappingCatalog { entities }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_row_v3() -> Record {
        let mut r = Record::new();
        r.insert("fixture.id".into(), FieldValue::Int(100));
        r.insert("fixture.status.short".into(), FieldValue::Str("FT".into()));
        r.insert("goals.home".into(), FieldValue::Int(2));
        r.insert("goals.away".into(), FieldValue::Int(1));
        r.insert("league.id".into(), FieldValue::Int(39));
        r.insert("league.season".into(), FieldValue::Int(2025));
        r
    }

    #[test]
    fn builtin_catalog_validates() {
        let report = MappingCatalog::builtin().validate().unwrap();
        assert!(report.columns > 30);
        assert!(report.aliases > report.columns);
    }

    #[test]
    fn renamed_field_maps_to_same_canonical_column() {
        let cat = MappingCatalog::builtin();
        let em = cat.for_entity(EntityType::Fixture).unwrap();

        let (row_v3, _) = em.normalize_row(&fixture_row_v3());

        // Same data under the pre-rename (v2-era) field names.
        let mut old = Record::new();
        old.insert("fixture_id".into(), FieldValue::Int(100));
        old.insert("statusShort".into(), FieldValue::Str("FT".into()));
        old.insert("goalsHomeTeam".into(), FieldValue::Int(2));
        old.insert("goalsAwayTeam".into(), FieldValue::Int(1));
        old.insert("league.id".into(), FieldValue::Int(39));
        old.insert("league.season".into(), FieldValue::Int(2025));
        let (row_v2, _) = em.normalize_row(&old);

        assert_eq!(row_v3, row_v2);
        assert_eq!(row_v3.get("status"), Some(&FieldValue::Str("FT".into())));
    }

    #[test]
    fn unexpected_fields_are_reported_and_dropped() {
        let cat = MappingCatalog::builtin();
        let em = cat.for_entity(EntityType::Fixture).unwrap();
        let mut raw = fixture_row_v3();
        raw.insert("fixture.periods.first".into(), FieldValue::Int(1_700_000));

        let (row, dropped) = em.normalize_row(&raw);
        assert!(!row.contains_key("fixture.periods.first"));
        assert_eq!(dropped, vec!["fixture.periods.first".to_string()]);
    }

    #[test]
    fn bookkeeping_columns_pass_through() {
        let cat = MappingCatalog::builtin();
        let em = cat.for_entity(EntityType::Fixture).unwrap();
        let mut raw = fixture_row_v3();
        raw.insert(COL_INGESTED_AT.into(), FieldValue::Int(1_755_000_000_000));

        let (row, dropped) = em.normalize_row(&raw);
        assert_eq!(
            row.get(COL_INGESTED_AT),
            Some(&FieldValue::Int(1_755_000_000_000))
        );
        assert!(dropped.is_empty());
    }

    #[test]
    fn coercions_handle_empty_and_numeric_text() {
        assert_eq!(Coercion::Float.apply(&FieldValue::Str("".into())), FieldValue::Null);
        assert_eq!(
            Coercion::Float.apply(&FieldValue::Str("2.0".into())),
            FieldValue::Float(2.0)
        );
        assert_eq!(Coercion::Int.apply(&FieldValue::Float(3.0)), FieldValue::Int(3));
        assert_eq!(Coercion::Int.apply(&FieldValue::Float(3.5)), FieldValue::Null);
        assert_eq!(
            Coercion::Str.apply(&FieldValue::Int(42)),
            FieldValue::Str("42".into())
        );
    }

    #[test]
    fn toml_catalog_round_trips() {
        let toml_src = r#"
[entities.countries]
  [[entities.countries.columns]]
  name = "country_name"
  source = ["name"]
  coerce = "str"

  [[entities.countries.columns]]
  name = "country_code"
  source = ["code"]
  coerce = "str"
"#;
        let cat = MappingCatalog::load_str(toml_src).unwrap();
        let em = cat.for_entity(EntityType::Country).unwrap();
        assert_eq!(em.columns.len(), 2);
    }

    #[test]
    fn missing_key_column_fails_validation() {
        let toml_src = r#"
[entities.teams]
  [[entities.teams.columns]]
  name = "team_name"
"#;
        assert!(MappingCatalog::load_str(toml_src).is_err());
    }
}
