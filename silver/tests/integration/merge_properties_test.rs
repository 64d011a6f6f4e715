use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use silver::merge::{CurrentStateTable, MergeOutcome};
use silver::types::{Cell, Record};
use silver_telemetry::tracing::init_test_tracing;

const KEYS: i64 = 40;
const CHANGES_PER_KEY: i64 = 6;

fn stamp(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
}

fn flights_table() -> CurrentStateTable {
    CurrentStateTable::new(
        "silver_flights",
        vec!["flight_id".to_string()],
        "modifiedDate",
        8,
    )
}

/// Every key gets changes with distinct sequence values, the payload encodes the sequence.
fn changes(rng: &mut StdRng) -> Vec<Record> {
    let mut changes = Vec::new();
    for flight_id in 0..KEYS {
        let mut sequences: Vec<i64> = (0..100).collect();
        sequences.shuffle(rng);

        for sequence in sequences.into_iter().take(CHANGES_PER_KEY as usize) {
            changes.push(
                Record::new()
                    .with("flight_id", flight_id)
                    .with("status", format!("status-{sequence}"))
                    .with("modifiedDate", stamp(sequence)),
            );
        }
    }

    changes
}

fn expected_state(changes: &[Record]) -> BTreeMap<i64, Record> {
    let mut expected: BTreeMap<i64, Record> = BTreeMap::new();
    for change in changes {
        let Cell::I64(flight_id) = change.value("flight_id") else {
            panic!("flight_id must be an integer");
        };

        let replace = match expected.get(flight_id) {
            Some(current) => {
                change
                    .value("modifiedDate")
                    .sequence_cmp(current.value("modifiedDate"))
                    == Some(Ordering::Greater)
            }
            None => true,
        };

        if replace {
            expected.insert(*flight_id, change.clone());
        }
    }

    expected
}

fn state_of(table: &CurrentStateTable) -> BTreeMap<i64, Record> {
    table
        .snapshot()
        .into_iter()
        .map(|row| match row.value("flight_id") {
            Cell::I64(flight_id) => (*flight_id, row),
            other => panic!("unexpected flight_id {other}"),
        })
        .collect()
}

#[test]
fn merge_converges_to_max_sequence_under_any_order() {
    init_test_tracing();
    let mut rng = StdRng::seed_from_u64(7);
    let changes = changes(&mut rng);
    let expected = expected_state(&changes);

    for _ in 0..20 {
        let mut shuffled = changes.clone();
        shuffled.shuffle(&mut rng);

        let table = flights_table();
        for change in shuffled {
            table.apply(change);
        }

        assert_eq!(state_of(&table), expected);
    }
}

#[test]
fn merge_is_idempotent_under_duplication() {
    init_test_tracing();
    let mut rng = StdRng::seed_from_u64(11);
    let changes = changes(&mut rng);
    let expected = expected_state(&changes);

    let mut duplicated = Vec::new();
    for change in &changes {
        let copies = rng.gen_range(1..=3);
        for _ in 0..copies {
            duplicated.push(change.clone());
        }
    }
    duplicated.shuffle(&mut rng);

    let table = flights_table();
    for change in duplicated {
        table.apply(change);
    }
    assert_eq!(state_of(&table), expected);

    // Replaying everything again changes nothing.
    for change in changes {
        assert_ne!(table.apply(change), MergeOutcome::Inserted);
    }
    assert_eq!(state_of(&table), expected);
    assert_eq!(table.stats().inserted, KEYS as usize);
}

#[tokio::test(flavor = "multi_thread")]
async fn partitioned_batches_match_sequential_application() {
    init_test_tracing();
    let mut rng = StdRng::seed_from_u64(23);
    let mut changes = changes(&mut rng);
    changes.shuffle(&mut rng);
    let expected = expected_state(&changes);

    let table = flights_table();
    for batch in changes.chunks(37) {
        let result = table.apply_batch(batch.to_vec(), 4).await.unwrap();
        assert_eq!(result.records_processed, batch.len());
        assert_eq!(result.dropped(), 0);
    }

    assert_eq!(state_of(&table), expected);

    let stats = table.stats();
    assert_eq!(stats.records_processed, (KEYS * CHANGES_PER_KEY) as usize);
    assert_eq!(stats.inserted, KEYS as usize);
    assert_eq!(
        stats.inserted + stats.replaced + stats.discarded,
        stats.records_processed
    );
}

#[test]
fn concurrent_writers_converge() {
    init_test_tracing();
    let mut rng = StdRng::seed_from_u64(31);
    let changes = changes(&mut rng);
    let expected = expected_state(&changes);

    let table = flights_table();
    std::thread::scope(|scope| {
        for chunk in changes.chunks(changes.len() / 4 + 1) {
            let table = table.clone();
            scope.spawn(move || {
                for change in chunk.iter().rev() {
                    table.apply(change.clone());
                }
            });
        }
    });

    assert_eq!(state_of(&table), expected);
}
