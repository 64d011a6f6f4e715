use silver::append::AppendOnlyTable;
use silver::merge::CurrentStateTable;
use silver::types::{Cell, Record};
use silver::view::{BusinessView, ViewJoin};
use silver_telemetry::tracing::init_test_tracing;

struct Tables {
    bookings: AppendOnlyTable,
    flights: CurrentStateTable,
    passengers: CurrentStateTable,
    view: BusinessView,
}

fn tables() -> Tables {
    let bookings = AppendOnlyTable::new("silver_bookings");
    let current = |name: &str, key: &str| {
        CurrentStateTable::new(name, vec![key.to_string()], "modifiedDate", 4)
    };
    let flights = current("silver_flights", "flight_id");
    let passengers = current("silver_passengers", "passenger_id");

    let view = BusinessView::new(
        "silver_business",
        bookings.clone().into(),
        vec![
            ViewJoin {
                table: flights.clone().into(),
                key: "flight_id".to_string(),
            },
            ViewJoin {
                table: passengers.clone().into(),
                key: "passenger_id".to_string(),
            },
        ],
        vec!["modifiedDate".to_string()],
    );

    Tables {
        bookings,
        flights,
        passengers,
        view,
    }
}

fn booking(booking_id: i64, flight_id: i64, passenger_id: i64) -> Record {
    Record::new()
        .with("booking_id", booking_id)
        .with("flight_id", flight_id)
        .with("passenger_id", passenger_id)
        .with("origin", "booked")
        .with("modifiedDate", 1)
}

fn flight(flight_id: i64, status: &str, sequence: i64) -> Record {
    Record::new()
        .with("flight_id", flight_id)
        .with("status", status)
        .with("origin", "LIS")
        .with("modifiedDate", sequence)
}

fn passenger(passenger_id: i64, name: &str) -> Record {
    Record::new()
        .with("passenger_id", passenger_id)
        .with("name", name)
        .with("modifiedDate", 1)
}

#[test]
fn rows_appear_once_every_side_is_present() {
    init_test_tracing();
    let tables = tables();

    tables.bookings.append_batch(vec![booking(1, 9, 7)]);
    tables.flights.apply(flight(9, "scheduled", 1));
    assert!(tables.view.is_empty());

    tables.passengers.apply(passenger(7, "Ada"));

    let rows = tables.view.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value("name"), &Cell::from("Ada"));
    assert_eq!(rows[0].value("status"), &Cell::from("scheduled"));
    assert!(!rows[0].contains("modifiedDate"));
}

#[test]
fn dimension_updates_are_reflected_on_the_next_read() {
    init_test_tracing();
    let tables = tables();

    tables.bookings.append_batch(vec![booking(1, 9, 7)]);
    tables.passengers.apply(passenger(7, "Ada"));
    tables.flights.apply(flight(9, "scheduled", 1));
    assert_eq!(tables.view.rows()[0].value("status"), &Cell::from("scheduled"));

    tables.flights.apply(flight(9, "delayed", 2));
    tables.flights.apply(flight(9, "cancelled", 0));

    assert_eq!(tables.view.rows()[0].value("status"), &Cell::from("delayed"));
}

#[test]
fn every_booking_of_a_flight_gets_a_row() {
    init_test_tracing();
    let tables = tables();

    tables
        .bookings
        .append_batch(vec![booking(1, 9, 7), booking(2, 9, 7), booking(3, 10, 7)]);
    tables.flights.apply(flight(9, "scheduled", 1));
    tables.passengers.apply(passenger(7, "Ada"));

    let booking_ids: Vec<_> = tables
        .view
        .rows()
        .iter()
        .map(|row| row.value("booking_id").clone())
        .collect();
    assert_eq!(booking_ids, vec![Cell::I64(1), Cell::I64(2)]);
}

#[test]
fn earliest_input_wins_on_column_collisions() {
    init_test_tracing();
    let tables = tables();

    tables.bookings.append_batch(vec![booking(1, 9, 7)]);
    tables.flights.apply(flight(9, "scheduled", 1));
    tables.passengers.apply(passenger(7, "Ada"));

    let row = &tables.view.rows()[0];
    assert_eq!(row.value("origin"), &Cell::from("booked"));
    assert_eq!(
        row.column_names().filter(|name| *name == "flight_id").count(),
        1
    );
}
