use std::time::Duration;

use silver::pipeline::Pipeline;
use silver::store::memory::MemoryStateStore;
use silver::test_utils::airline::{
    AirlineSources, SILVER_BOOKINGS, SILVER_BUSINESS, SILVER_FLIGHTS, airline_config, airport,
    booking, flight, passenger,
};
use silver::test_utils::wait::wait_until_async;
use silver::types::Cell;
use silver_config::shared::ViolationPolicy;
use silver_telemetry::tracing::init_test_tracing;
use tokio::time::timeout;

const PIPELINE_TIMEOUT: Duration = Duration::from_secs(30);

async fn committed_offset(store: &MemoryStateStore, table: &str) -> u64 {
    store
        .checkpoints()
        .await
        .get(table)
        .map(|checkpoint| checkpoint.next_offset)
        .unwrap_or(0)
}

#[tokio::test(flavor = "multi_thread")]
async fn restarted_pipeline_resumes_from_its_checkpoints() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = airline_config(dir.path(), ViolationPolicy::Drop);
    let store = MemoryStateStore::new();

    let sources = AirlineSources::new();
    sources.airports().push(airport(1, "Lisbon"));
    sources.passengers().push(passenger(7, "Ada"));
    sources.flights().push(flight(9, "scheduled"));
    sources.bookings().push(booking(6, 9, 7, "99.90"));

    // First run, stopped once every record is committed.
    let mut pipeline = Pipeline::new(sources.graph(&config).unwrap(), store.clone());
    pipeline.start().await.unwrap();
    wait_until_async("the first run commits", || {
        let store = store.clone();
        async move {
            committed_offset(&store, SILVER_BOOKINGS).await == 1
                && committed_offset(&store, SILVER_FLIGHTS).await == 1
        }
    })
    .await;
    let first_stamp = pipeline
        .table(SILVER_FLIGHTS)
        .unwrap()
        .snapshot()[0]
        .value("modifiedDate")
        .clone();
    timeout(PIPELINE_TIMEOUT, pipeline.shutdown_and_wait())
        .await
        .unwrap()
        .unwrap();

    // Changes arriving while the pipeline is down.
    sources.bookings().push(booking(7, 9, 7, "10.00"));
    sources.flights().push(flight(9, "boarding"));
    sources.close();

    let mut pipeline = Pipeline::new(sources.graph(&config).unwrap(), store.clone());
    let bookings = pipeline.table(SILVER_BOOKINGS).unwrap();
    let flights = pipeline.table(SILVER_FLIGHTS).unwrap();
    let view = pipeline.view(SILVER_BUSINESS).unwrap().clone();
    pipeline.start().await.unwrap();
    timeout(PIPELINE_TIMEOUT, pipeline.wait())
        .await
        .unwrap()
        .unwrap();

    let booking_ids: Vec<_> = bookings
        .snapshot()
        .iter()
        .map(|row| row.value("booking_id").clone())
        .collect();
    assert_eq!(booking_ids, vec![Cell::I64(6), Cell::I64(7)]);

    let flight_rows = flights.snapshot();
    assert_eq!(flight_rows.len(), 1);
    assert_eq!(flight_rows[0].value("status"), &Cell::from("boarding"));
    assert_ne!(flight_rows[0].value("modifiedDate"), &first_stamp);

    assert_eq!(view.len(), 2);
    assert_eq!(committed_offset(&store, SILVER_BOOKINGS).await, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_without_new_changes_keeps_tables_unchanged() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = airline_config(dir.path(), ViolationPolicy::Drop);
    let store = MemoryStateStore::new();

    let sources = AirlineSources::new();
    sources.flights().extend([flight(9, "scheduled"), flight(9, "delayed")]);
    sources
        .bookings()
        .extend([booking(6, 9, 7, "99.90"), booking(5, 9, None, "12.50")]);
    sources.close();

    let mut snapshots = Vec::new();
    for _ in 0..3 {
        let mut pipeline = Pipeline::new(sources.graph(&config).unwrap(), store.clone());
        let bookings = pipeline.table(SILVER_BOOKINGS).unwrap();
        let flights = pipeline.table(SILVER_FLIGHTS).unwrap();

        pipeline.start().await.unwrap();
        timeout(PIPELINE_TIMEOUT, pipeline.wait())
            .await
            .unwrap()
            .unwrap();

        snapshots.push((bookings.snapshot(), flights.snapshot()));
    }

    let (bookings, flights) = &snapshots[0];
    assert_eq!(bookings.len(), 1);
    assert_eq!(flights[0].value("status"), &Cell::from("delayed"));
    assert!(snapshots.iter().all(|snapshot| snapshot == &snapshots[0]));
}
