//! Fixtures of the airline pipeline: bookings, flights, passengers and airports.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use silver_config::shared::{
    BatchConfig, CastConfig, CastType, EntityConfig, ExpectationsConfig, JoinConfig, MergeConfig,
    PipelineConfig, RuleConfig, SEQUENCE_COLUMN_NAME, SourceConfig, TableMode, TransformConfig,
    ViewConfig, ViolationPolicy,
};

use crate::error::SilverResult;
use crate::pipeline::PipelineGraph;
use crate::source::Source;
use crate::source::memory::MemorySource;
use crate::types::Record;

pub const BOOKINGS: &str = "bookings";
pub const FLIGHTS: &str = "flights";
pub const PASSENGERS: &str = "passengers";
pub const AIRPORTS: &str = "airports";

pub const SILVER_BOOKINGS: &str = "silver_bookings";
pub const SILVER_FLIGHTS: &str = "silver_flights";
pub const SILVER_PASSENGERS: &str = "silver_passengers";
pub const SILVER_AIRPORTS: &str = "silver_airports";
pub const SILVER_BUSINESS: &str = "silver_business";

/// A raw booking, `None` ids are sent as nulls.
pub fn booking(
    booking_id: impl Into<Option<i64>>,
    flight_id: impl Into<Option<i64>>,
    passenger_id: impl Into<Option<i64>>,
    amount: &str,
) -> Record {
    Record::new()
        .with("booking_id", booking_id.into())
        .with("flight_id", flight_id.into())
        .with("passenger_id", passenger_id.into())
        .with("airport_id", 1)
        .with("amount", amount)
        .with("booking_date", "2024-05-01")
}

pub fn flight(flight_id: impl Into<Option<i64>>, status: &str) -> Record {
    Record::new()
        .with("flight_id", flight_id.into())
        .with("status", status)
        .with("origin", "LIS")
}

pub fn passenger(passenger_id: impl Into<Option<i64>>, name: &str) -> Record {
    Record::new()
        .with("passenger_id", passenger_id.into())
        .with("name", name)
}

pub fn airport(airport_id: impl Into<Option<i64>>, city: &str) -> Record {
    Record::new()
        .with("airport_id", airport_id.into())
        .with("city", city)
}

/// Configuration of the airline pipeline with sources below `directory`.
pub fn airline_config(directory: &Path, policy: ViolationPolicy) -> PipelineConfig {
    let source = |entity: &str| SourceConfig {
        path: directory
            .join(format!("{entity}.jsonl"))
            .to_string_lossy()
            .into_owned(),
        poll_interval_ms: 10,
    };
    let cdc = |key: &str| TableMode::Cdc {
        keys: vec![key.to_string()],
        sequence_by: SEQUENCE_COLUMN_NAME.to_string(),
        stored_as_scd_type: 1,
    };
    let not_null = |name: &str, column: &str| RuleConfig {
        name: name.to_string(),
        expression: format!("{column} IS NOT NULL"),
    };

    let bookings = EntityConfig {
        name: BOOKINGS.to_string(),
        table: SILVER_BOOKINGS.to_string(),
        source: source(BOOKINGS),
        transform: TransformConfig {
            casts: vec![
                CastConfig {
                    column: "amount".to_string(),
                    to: CastType::Double,
                },
                CastConfig {
                    column: "booking_date".to_string(),
                    to: CastType::Date,
                },
            ],
            ..TransformConfig::default()
        },
        expectations: Some(ExpectationsConfig {
            policy,
            rules: vec![
                not_null("rule1", "booking_id"),
                not_null("rule2", "passenger_id"),
                not_null("rule3", "flight_id"),
            ],
        }),
        mode: TableMode::Append,
    };

    let dimension = |name: &str, table: &str, key: &str| EntityConfig {
        name: name.to_string(),
        table: table.to_string(),
        source: source(name),
        transform: TransformConfig::default(),
        expectations: None,
        mode: cdc(key),
    };

    let join = |table: &str, key: &str| JoinConfig {
        table: table.to_string(),
        key: key.to_string(),
    };

    PipelineConfig {
        id: "airline".to_string(),
        entities: vec![
            bookings,
            dimension(FLIGHTS, SILVER_FLIGHTS, "flight_id"),
            dimension(PASSENGERS, SILVER_PASSENGERS, "passenger_id"),
            dimension(AIRPORTS, SILVER_AIRPORTS, "airport_id"),
        ],
        views: vec![ViewConfig {
            name: SILVER_BUSINESS.to_string(),
            base: SILVER_BOOKINGS.to_string(),
            joins: vec![
                join(SILVER_FLIGHTS, "flight_id"),
                join(SILVER_PASSENGERS, "passenger_id"),
                join(SILVER_AIRPORTS, "airport_id"),
            ],
            drop_columns: vec![SEQUENCE_COLUMN_NAME.to_string()],
        }],
        batch: BatchConfig {
            max_size: 100,
            max_fill_ms: 10,
        },
        merge: MergeConfig {
            shards: 4,
            partitions: 2,
            ..MergeConfig::default()
        },
    }
}

/// In-memory sources of the airline entities.
///
/// Cloning shares the underlying logs, so a test can keep pushing records after the sources
/// were handed to a pipeline.
#[derive(Debug, Clone)]
pub struct AirlineSources {
    sources: HashMap<String, MemorySource>,
}

impl AirlineSources {
    pub fn new() -> Self {
        let sources = [BOOKINGS, FLIGHTS, PASSENGERS, AIRPORTS]
            .into_iter()
            .map(|name| (name.to_string(), MemorySource::new(name)))
            .collect();

        Self { sources }
    }

    /// Returns the source of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not an airline entity.
    pub fn get(&self, entity: &str) -> &MemorySource {
        self.sources
            .get(entity)
            .unwrap_or_else(|| panic!("unknown airline entity `{entity}`"))
    }

    pub fn bookings(&self) -> &MemorySource {
        self.get(BOOKINGS)
    }

    pub fn flights(&self) -> &MemorySource {
        self.get(FLIGHTS)
    }

    pub fn passengers(&self) -> &MemorySource {
        self.get(PASSENGERS)
    }

    pub fn airports(&self) -> &MemorySource {
        self.get(AIRPORTS)
    }

    /// Ends every stream once the pushed records are delivered.
    pub fn close(&self) {
        for source in self.sources.values() {
            source.close();
        }
    }

    /// Builds the graph of `config` reading from these sources.
    pub fn graph(&self, config: &PipelineConfig) -> SilverResult<PipelineGraph> {
        PipelineGraph::from_config(config, |entity| {
            let source: Arc<dyn Source> = Arc::new(self.get(&entity.name).clone());
            Ok(source)
        })
    }
}

impl Default for AirlineSources {
    fn default() -> Self {
        Self::new()
    }
}
