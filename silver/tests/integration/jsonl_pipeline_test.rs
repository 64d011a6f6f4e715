use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use silver::conversions::json::record_to_json;
use silver::pipeline::{Pipeline, PipelineGraph};
use silver::source::Source;
use silver::source::jsonl::JsonLinesSource;
use silver::store::StateStore;
use silver::store::file::FileStateStore;
use silver::test_utils::airline::{
    AIRPORTS, BOOKINGS, FLIGHTS, PASSENGERS, SILVER_BOOKINGS, SILVER_BUSINESS, SILVER_FLIGHTS,
    airline_config, airport, booking, flight, passenger,
};
use silver::types::{Cell, Record};
use silver_config::shared::{PipelineConfig, ViolationPolicy};
use silver_telemetry::tracing::init_test_tracing;
use tokio::time::timeout;

const PIPELINE_TIMEOUT: Duration = Duration::from_secs(30);

fn append_lines(directory: &Path, entity: &str, lines: &[String]) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(directory.join(format!("{entity}.jsonl")))
        .unwrap();

    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

fn append_records(directory: &Path, entity: &str, records: &[Record]) {
    let lines: Vec<_> = records
        .iter()
        .map(|record| record_to_json(record).to_string())
        .collect();
    append_lines(directory, entity, &lines);
}

/// Sources read each file to its end and stop.
fn drain_graph(config: &PipelineConfig) -> PipelineGraph {
    PipelineGraph::from_config(config, |entity| {
        let source = JsonLinesSource::from_config(entity.name.clone(), &entity.source)
            .with_follow(false);
        let source: Arc<dyn Source> = Arc::new(source);
        Ok(source)
    })
    .unwrap()
}

async fn run_to_end(config: &PipelineConfig, store: &FileStateStore) -> Vec<Record> {
    let mut pipeline = Pipeline::new(drain_graph(config), store.clone());
    let view = pipeline.view(SILVER_BUSINESS).unwrap().clone();

    pipeline.start().await.unwrap();
    timeout(PIPELINE_TIMEOUT, pipeline.wait())
        .await
        .unwrap()
        .unwrap();

    view.rows()
}

#[tokio::test(flavor = "multi_thread")]
async fn file_sources_and_checkpoints_survive_restarts() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let bronze = dir.path().join("bronze");
    std::fs::create_dir_all(&bronze).unwrap();
    let config = airline_config(&bronze, ViolationPolicy::Drop);
    let store = FileStateStore::new(dir.path().join("state"));

    append_records(&bronze, AIRPORTS, &[airport(1, "Lisbon")]);
    append_records(&bronze, PASSENGERS, &[passenger(7, "Ada")]);
    append_records(&bronze, FLIGHTS, &[flight(9, "scheduled")]);
    append_records(&bronze, BOOKINGS, &[booking(6, 9, 7, "99.90")]);
    // Unparseable lines are quarantined, then fail the not-null rules.
    append_lines(&bronze, BOOKINGS, &[r#"{"booking_id": 8, "#.to_string()]);

    let rows = run_to_end(&config, &store).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value("status"), &Cell::from("scheduled"));
    assert_eq!(rows[0].value("amount"), &Cell::F64(99.9));

    let checkpoint = store.load_checkpoint(SILVER_BOOKINGS).await.unwrap().unwrap();
    assert_eq!(checkpoint.next_offset, 2);
    assert_eq!(checkpoint.rows.len(), 1);

    append_records(&bronze, FLIGHTS, &[flight(9, "delayed")]);
    append_records(&bronze, BOOKINGS, &[booking(7, 9, 7, "10.00")]);

    let rows = run_to_end(&config, &store).await;
    assert_eq!(rows.len(), 2);
    assert!(
        rows.iter()
            .all(|row| row.value("status") == &Cell::from("delayed"))
    );

    let flights = store.load_checkpoint(SILVER_FLIGHTS).await.unwrap().unwrap();
    assert_eq!(flights.next_offset, 2);
    assert_eq!(flights.rows.len(), 1);
    assert_eq!(flights.records_processed, 2);
}
