//! Gold layer: analysis-ready tables derived from Silver.
//!
//! Dimensions (leagues, teams, countries) are rebuilt wholesale from their
//! Silver tables on every run. The fixtures fact table is maintained by
//! upsert, and a fixture is only emitted once every dimension reference
//! resolves: its league+season, both teams, and the league's country must
//! all exist in Silver. Unresolved fixtures are held back and picked up by
//! a later run once the dimensions have been backfilled, so Gold never
//! contains a dangling reference.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use crate::errors::PipelineError;
use crate::models::{
    COL_LAST_UPDATED_AT, COL_SOURCE_INGESTED_AT, CuratedBatch, EntityType, FieldValue, Record,
};
use crate::store::{Layer, TableStore};

/// Derives the Gold tables.
#[derive(Debug, Clone)]
pub struct Curator {
    store: TableStore,
}

/// Outcome of comparing final goal counts.
pub fn match_winner(goals_home: Option<i64>, goals_away: Option<i64>) -> Option<&'static str> {
    match (goals_home, goals_away) {
        (Some(h), Some(a)) if h > a => Some("home"),
        (Some(h), Some(a)) if h < a => Some("away"),
        (Some(_), Some(_)) => Some("draw"),
        _ => None,
    }
}

/// Sum of final goal counts; `None` until both are known.
pub fn total_goals(goals_home: Option<i64>, goals_away: Option<i64>) -> Option<i64> {
    Some(goals_home? + goals_away?)
}

impl Curator {
    /// Creates a curator over `store`.
    pub fn new(store: TableStore) -> Self {
        Curator { store }
    }

    /// Refreshes the entity's Gold table from Silver.
    pub fn curate(&self, entity: EntityType) -> Result<CuratedBatch, PipelineError> {
        let batch = match entity {
            EntityType::Fixture => self.curate_fixtures()?,
            _ => self.rebuild_dimension(entity)?,
        };
        info!(
            entity = entity.code(),
            emitted = batch.emitted,
            held_back = batch.held_back,
            "gold curation complete"
        );
        Ok(batch)
    }

    /// Full-snapshot rebuild of a dimension, provenance columns stripped.
    fn rebuild_dimension(&self, entity: EntityType) -> Result<CuratedBatch, PipelineError> {
        let rows: Vec<Record> = self
            .store
            .read_current(Layer::Silver, entity)?
            .into_iter()
            .map(|mut r| {
                r.shift_remove(COL_LAST_UPDATED_AT);
                r.shift_remove(COL_SOURCE_INGESTED_AT);
                r
            })
            .collect();
        let emitted = rows.len();

        let mut txn = self.store.begin(Layer::Gold, entity)?;
        txn.write_rows(rows);
        txn.commit()?;
        Ok(CuratedBatch {
            emitted,
            held_back: 0,
        })
    }

    fn curate_fixtures(&self) -> Result<CuratedBatch, PipelineError> {
        let fixtures = self.store.read_current(Layer::Silver, EntityType::Fixture)?;
        if fixtures.is_empty() {
            return Ok(CuratedBatch {
                emitted: 0,
                held_back: 0,
            });
        }

        // Dimension lookups come from Silver, not Gold, so curation order
        // within a run does not matter.
        let leagues: IndexMap<String, Record> = self
            .store
            .read_current(Layer::Silver, EntityType::League)?
            .into_iter()
            .filter_map(|r| {
                let id = r.get("league_id")?.as_int()?;
                let season = r.get("season")?.as_int()?;
                Some((format!("{id}|{season}"), r))
            })
            .collect();
        let teams: IndexMap<i64, Record> = self
            .store
            .read_current(Layer::Silver, EntityType::Team)?
            .into_iter()
            .filter_map(|r| Some((r.get("team_id")?.as_int()?, r)))
            .collect();
        let countries: IndexSet<String> = self
            .store
            .read_current(Layer::Silver, EntityType::Country)?
            .into_iter()
            .filter_map(|r| r.get("country_name")?.as_str().map(str::to_string))
            .collect();

        let mut emitted_rows = Vec::new();
        let mut held_back = 0usize;
        for fixture in &fixtures {
            match curated_fixture(fixture, &leagues, &teams, &countries) {
                Some(row) => emitted_rows.push(row),
                None => {
                    held_back += 1;
                    debug!(
                        fixture_id = fixture.get("fixture_id").and_then(FieldValue::as_int),
                        "fixture held back: unresolved dimension reference"
                    );
                }
            }
        }

        let emitted = emitted_rows.len();
        self.store
            .upsert(Layer::Gold, EntityType::Fixture, emitted_rows, &["fixture_id"])?;
        Ok(CuratedBatch { emitted, held_back })
    }
}

/// Joins one Silver fixture against the dimensions. `None` when any
/// reference does not resolve.
fn curated_fixture(
    fixture: &Record,
    leagues: &IndexMap<String, Record>,
    teams: &IndexMap<i64, Record>,
    countries: &IndexSet<String>,
) -> Option<Record> {
    let league_id = fixture.get("league_id")?.as_int()?;
    let season = fixture.get("season")?.as_int()?;
    let league = leagues.get(&format!("{league_id}|{season}"))?;

    let country_name = league.get("country_name")?.as_str()?.to_string();
    if !countries.contains(&country_name) {
        return None;
    }

    let home_id = fixture.get("teams_home_id")?.as_int()?;
    let away_id = fixture.get("teams_away_id")?.as_int()?;
    let home = teams.get(&home_id)?;
    let away = teams.get(&away_id)?;

    let goals_home = fixture.get("goals_home").and_then(FieldValue::as_int);
    let goals_away = fixture.get("goals_away").and_then(FieldValue::as_int);

    let opt_str = |v: Option<&FieldValue>| {
        v.and_then(FieldValue::render)
            .map(FieldValue::Str)
            .unwrap_or(FieldValue::Null)
    };
    let opt_int = |v: Option<i64>| v.map(FieldValue::Int).unwrap_or(FieldValue::Null);

    let mut row = Record::new();
    row.insert("fixture_id".into(), FieldValue::Int(fixture.get("fixture_id")?.as_int()?));
    row.insert("event_date".into(), opt_str(fixture.get("event_date")));
    row.insert("season".into(), FieldValue::Int(season));
    row.insert("status".into(), opt_str(fixture.get("status")));
    row.insert("league_id".into(), FieldValue::Int(league_id));
    row.insert("league_name".into(), opt_str(league.get("league_name")));
    row.insert("country_name".into(), FieldValue::Str(country_name));
    row.insert("home_team_id".into(), FieldValue::Int(home_id));
    row.insert("home_team_name".into(), opt_str(home.get("team_name")));
    row.insert("away_team_id".into(), FieldValue::Int(away_id));
    row.insert("away_team_name".into(), opt_str(away.get("team_name")));
    row.insert("goals_home".into(), opt_int(goals_home));
    row.insert("goals_away".into(), opt_int(goals_away));
    row.insert(
        "match_winner".into(),
        match_winner(goals_home, goals_away)
            .map(|w| FieldValue::Str(w.to_string()))
            .unwrap_or(FieldValue::Null),
    );
    row.insert("total_goals".into(), opt_int(total_goals(goals_home, goals_away)));
    Some(row)
}
