#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use football_ingestor::models::endpoint::Endpoint;
use football_ingestor::models::fetch_params::FetchParams;
use football_ingestor::providers::{ProviderError, SourceClient};
use indexmap::IndexMap;
use lake_sync::config::{ApiConfig, PipelineConfig, RetryConfig};
use lake_sync::state::{connection, migrate};
use serde_json::{Value, json};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/state.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("state.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_sqlite(&path).expect("migrations");
    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal");

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

/// A lake rooted in a tempdir plus a migrated state database next to it.
pub struct TestLake {
    pub dir: TempDir,
    pub config: PipelineConfig,
}

pub fn setup_lake() -> TestLake {
    let dir = TempDir::new().expect("tempdir");
    let lake_root = dir.path().join("lake");
    let state_db = dir.path().join("state.db");
    migrate::run_sqlite(&state_db.to_string_lossy()).expect("migrations");

    let config = PipelineConfig {
        lake_root,
        state_db,
        api: ApiConfig::default(),
        retry: RetryConfig::default(),
        endpoints: IndexMap::new(),
        mapping_file: None,
    };
    TestLake { dir, config }
}

/// Source stub serving canned payloads per endpoint.
pub struct StubClient {
    payloads: Mutex<IndexMap<Endpoint, Vec<Value>>>,
}

impl StubClient {
    pub fn new() -> Self {
        StubClient {
            payloads: Mutex::new(IndexMap::new()),
        }
    }

    pub fn with_default_payloads() -> Self {
        let stub = Self::new();
        stub.set(Endpoint::Countries, vec![country_payload("England", "GB")]);
        stub.set(Endpoint::Leagues, vec![league_payload(39, "England", 2025)]);
        stub.set(
            Endpoint::Teams,
            vec![
                team_payload(33, "Manchester United"),
                team_payload(34, "Newcastle"),
            ],
        );
        stub.set(
            Endpoint::Fixtures,
            vec![fixture_payload(100, 33, 34, "FT", Some(2), Some(1))],
        );
        stub
    }

    pub fn set(&self, endpoint: Endpoint, payloads: Vec<Value>) {
        self.payloads.lock().unwrap().insert(endpoint, payloads);
    }
}

#[async_trait]
impl SourceClient for StubClient {
    async fn fetch(
        &self,
        endpoint: Endpoint,
        _params: &FetchParams,
    ) -> Result<Vec<Value>, ProviderError> {
        Ok(self
            .payloads
            .lock()
            .unwrap()
            .get(&endpoint)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn country_payload(name: &str, code: &str) -> Value {
    json!({"name": name, "code": code, "flag": format!("https://flags.example/{code}.svg")})
}

pub fn league_payload(id: i64, country: &str, season: i64) -> Value {
    json!({
        "league": {"id": id, "name": "Premier League", "type": "League"},
        "country": {"name": country, "code": "GB"},
        "seasons": [{"year": season, "start": "2025-08-01", "end": "2026-05-24", "current": true}]
    })
}

pub fn team_payload(id: i64, name: &str) -> Value {
    json!({
        "team": {"id": id, "name": name, "code": "ABC", "country": "England", "founded": 1878},
        "venue": {"name": "Stadium", "city": "City"}
    })
}

pub fn fixture_payload(
    id: i64,
    home: i64,
    away: i64,
    status: &str,
    goals_home: Option<i64>,
    goals_away: Option<i64>,
) -> Value {
    json!({
        "fixture": {
            "id": id,
            "date": "2025-08-22T19:00:00+00:00",
            "referee": "M. Oliver",
            "status": {"short": status},
            "venue": {"name": "Stadium"}
        },
        "league": {"id": 39, "name": "Premier League", "season": 2025, "round": "Regular Season - 1"},
        "teams": {
            "home": {"id": home, "name": "Home"},
            "away": {"id": away, "name": "Away"}
        },
        "goals": {"home": goals_home, "away": goals_away},
        "score": {
            "extratime": {"home": null, "away": null},
            "penalty": {"home": null, "away": null}
        }
    })
}
