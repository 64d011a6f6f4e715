use std::time::Duration;

use silver::error::ErrorKind;
use silver::pipeline::Pipeline;
use silver::store::memory::MemoryStateStore;
use silver::test_utils::airline::{
    AirlineSources, SILVER_BOOKINGS, SILVER_BUSINESS, SILVER_FLIGHTS, airline_config, airport,
    booking, flight, passenger,
};
use silver::test_utils::wait::wait_until;
use silver::types::Cell;
use silver_config::shared::ViolationPolicy;
use silver_telemetry::tracing::init_test_tracing;
use tokio::time::timeout;

const PIPELINE_TIMEOUT: Duration = Duration::from_secs(30);

fn seed_dimensions(sources: &AirlineSources) {
    sources.airports().push(airport(1, "Lisbon"));
    sources.flights().push(flight(9, "scheduled"));
    sources.passengers().push(passenger(7, "Ada"));
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_sources_are_drained_into_tables_and_view() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = airline_config(dir.path(), ViolationPolicy::Drop);

    let sources = AirlineSources::new();
    seed_dimensions(&sources);
    sources.flights().push(flight(9, "delayed"));
    sources.bookings().extend([
        booking(5, 9, None, "12.50"),
        booking(6, 9, 7, "99.90"),
        // Flight 10 never arrives, so this booking stays out of the view.
        booking(8, 10, 7, "1.00"),
    ]);
    sources.close();

    let store = MemoryStateStore::new();
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
    assert_eq!(booking_ids, vec![Cell::I64(6), Cell::I64(8)]);

    assert_eq!(flights.len(), 1);
    assert_eq!(flights.snapshot()[0].value("status"), &Cell::from("delayed"));

    let rows = view.rows();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.value("booking_id"), &Cell::I64(6));
    assert_eq!(row.value("amount"), &Cell::F64(99.9));
    assert_eq!(row.value("status"), &Cell::from("delayed"));
    assert_eq!(row.value("name"), &Cell::from("Ada"));
    assert_eq!(row.value("city"), &Cell::from("Lisbon"));
    assert!(!row.contains("modifiedDate"));

    let checkpoints = store.checkpoints().await;
    assert_eq!(checkpoints[SILVER_BOOKINGS].next_offset, 3);
    assert_eq!(checkpoints[SILVER_BOOKINGS].rows.len(), 2);
    assert_eq!(checkpoints[SILVER_FLIGHTS].next_offset, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn live_changes_reach_the_view() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = airline_config(dir.path(), ViolationPolicy::Drop);

    let sources = AirlineSources::new();
    let mut pipeline = Pipeline::new(sources.graph(&config).unwrap(), MemoryStateStore::new());
    let view = pipeline.view(SILVER_BUSINESS).unwrap().clone();
    pipeline.start().await.unwrap();

    sources.bookings().push(booking(6, 9, 7, "99.90"));
    seed_dimensions(&sources);

    wait_until("the booking is joined", || view.len() == 1).await;
    assert_eq!(view.rows()[0].value("status"), &Cell::from("scheduled"));

    sources.flights().push(flight(9, "delayed"));

    wait_until("the flight update is visible", || {
        view.rows()
            .first()
            .is_some_and(|row| row.value("status") == &Cell::from("delayed"))
    })
    .await;

    // Shutdown wakes workers waiting on idle sources.
    timeout(PIPELINE_TIMEOUT, pipeline.shutdown_and_wait())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn fail_policy_aborts_the_whole_pipeline() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = airline_config(dir.path(), ViolationPolicy::Fail);

    let sources = AirlineSources::new();
    seed_dimensions(&sources);
    sources.bookings().push(booking(5, 9, None, "12.50"));

    let mut pipeline = Pipeline::new(sources.graph(&config).unwrap(), MemoryStateStore::new());
    let bookings = pipeline.table(SILVER_BOOKINGS).unwrap();
    pipeline.start().await.unwrap();

    // The dimension sources stay open, only the failure can stop their workers.
    let err = timeout(PIPELINE_TIMEOUT, pipeline.wait())
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(err.kinds(), vec![ErrorKind::ValidationFailed]);
    assert!(bookings.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn warn_policy_keeps_failing_records() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = airline_config(dir.path(), ViolationPolicy::Warn);

    let sources = AirlineSources::new();
    seed_dimensions(&sources);
    sources
        .bookings()
        .extend([booking(5, 9, None, "12.50"), booking(6, 9, 7, "99.90")]);
    sources.close();

    let mut pipeline = Pipeline::new(sources.graph(&config).unwrap(), MemoryStateStore::new());
    let bookings = pipeline.table(SILVER_BOOKINGS).unwrap();
    let view = pipeline.view(SILVER_BUSINESS).unwrap().clone();
    let bookings_operator = pipeline
        .graph()
        .nodes()
        .iter()
        .find(|node| node.operator.validator().is_some())
        .map(|node| node.operator.clone())
        .unwrap();
    let validator_stats = || bookings_operator.validator().unwrap().stats();
    assert_eq!(validator_stats().warned, 0);

    pipeline.start().await.unwrap();
    wait_until("both bookings are appended", || bookings.len() == 2).await;

    let stats = validator_stats();
    assert_eq!(stats.warned, 1);
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.rule("rule2").unwrap().failed, 1);

    timeout(PIPELINE_TIMEOUT, pipeline.wait())
        .await
        .unwrap()
        .unwrap();

    // A null passenger never matches in the view.
    let rows = view.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value("booking_id"), &Cell::I64(6));
}
