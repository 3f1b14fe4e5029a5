use std::sync::Arc;
use std::time::Duration;

use football_ingestor::models::endpoint::Endpoint;
use lake_sync::flow::{FlowController, RunStatus};
use lake_sync::models::{EntityType, FieldValue};
use lake_sync::store::{Layer, TableStore};

mod common;

#[tokio::test]
async fn fixture_waits_for_its_dimensions_to_backfill() {
    let lake = common::setup_lake();
    let client = Arc::new(common::StubClient::with_default_payloads());
    // The away team is missing from the dimension feed.
    client.set(
        Endpoint::Teams,
        vec![common::team_payload(33, "Manchester United")],
    );

    let flow = FlowController::new(lake.config.clone(), client.clone()).unwrap();
    let reports = flow.run(&EntityType::all()).await.unwrap();

    let fixture_report = reports
        .iter()
        .find(|r| r.entity == EntityType::Fixture)
        .unwrap();
    let RunStatus::Succeeded { curated, .. } = &fixture_report.status else {
        panic!("fixtures did not succeed");
    };
    assert_eq!((curated.emitted, curated.held_back), (0, 1));

    let store = TableStore::new(&lake.config.lake_root);
    assert!(
        store
            .read_current(Layer::Gold, EntityType::Fixture)
            .unwrap()
            .is_empty()
    );

    // The missing team arrives in the next dimension fetch.
    client.set(
        Endpoint::Teams,
        vec![
            common::team_payload(33, "Manchester United"),
            common::team_payload(34, "Newcastle"),
        ],
    );
    std::thread::sleep(Duration::from_millis(5));
    let reports = flow.run(&EntityType::all()).await.unwrap();

    let fixture_report = reports
        .iter()
        .find(|r| r.entity == EntityType::Fixture)
        .unwrap();
    let RunStatus::Succeeded { curated, .. } = &fixture_report.status else {
        panic!("fixtures did not succeed");
    };
    assert_eq!((curated.emitted, curated.held_back), (1, 0));

    let gold = store.read_current(Layer::Gold, EntityType::Fixture).unwrap();
    assert_eq!(gold.len(), 1);
    assert_eq!(
        gold[0].get("away_team_name"),
        Some(&FieldValue::Str("Newcastle".into()))
    );
}
