//! Pipeline graph of named operators connected through typed ports.
//!
//! The graph is assembled once at startup with [`PipelineBuilder`]. Each port can only be used
//! where its type fits: a [`SourcePort`] is consumed by exactly one transform, the resulting
//! [`StreamPort`] can be validated and is consumed by exactly one table, and [`TablePort`]s feed
//! views. A finished [`PipelineGraph`] is then driven by a [`crate::pipeline::Pipeline`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use silver_config::shared::{
    BatchConfig, EntityConfig, ExpectationsConfig, MergeConfig, PipelineConfig, TableMode,
    TransformConfig, ViewConfig,
};
use tracing::debug;

use crate::append::AppendOnlyTable;
use crate::bail;
use crate::error::{ErrorKind, SilverResult};
use crate::merge::CurrentStateTable;
use crate::operator::{TableOperator, TableSink};
use crate::source::Source;
use crate::table::OutputTable;
use crate::transform::{Clock, MonotonicClock, TransformStage};
use crate::validation::RowValidator;
use crate::view::{BusinessView, ViewJoin};

/// Output port of a registered source, consumed by [`PipelineBuilder::transform`].
#[derive(Debug)]
#[must_use = "a source port must be connected to a transform"]
pub struct SourcePort {
    source: String,
}

impl SourcePort {
    pub fn name(&self) -> &str {
        &self.source
    }
}

/// Transformed, optionally validated, record stream destined to one table.
#[derive(Debug)]
#[must_use = "a stream port must be connected to a table"]
pub struct StreamPort {
    source: String,
    table: String,
    transform: Arc<TransformStage>,
    validator: Option<Arc<RowValidator>>,
}

impl StreamPort {
    /// Name of the table the stream is destined to.
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Handle to an output table of the graph.
#[derive(Debug, Clone)]
pub struct TablePort {
    table: String,
}

impl TablePort {
    pub fn name(&self) -> &str {
        &self.table
    }
}

/// Handle to a view of the graph.
#[derive(Debug, Clone)]
pub struct ViewPort {
    view: String,
}

impl ViewPort {
    pub fn name(&self) -> &str {
        &self.view
    }
}

/// A table together with the source and operator feeding it.
#[derive(Debug, Clone)]
pub struct TableNode {
    pub source: Arc<dyn Source>,
    pub operator: TableOperator,
}

/// Fully connected pipeline graph.
#[derive(Debug)]
pub struct PipelineGraph {
    id: String,
    nodes: Vec<TableNode>,
    tables: BTreeMap<String, OutputTable>,
    views: BTreeMap<String, BusinessView>,
    batch: BatchConfig,
}

impl PipelineGraph {
    /// Builds the graph described by `config`.
    ///
    /// `make_source` is called once per entity to open its source.
    pub fn from_config<F>(config: &PipelineConfig, mut make_source: F) -> SilverResult<Self>
    where
        F: FnMut(&EntityConfig) -> SilverResult<Arc<dyn Source>>,
    {
        config.validate()?;

        let mut builder = PipelineBuilder::new(config.id.clone())
            .with_batch(config.batch.clone())
            .with_merge(config.merge.clone());

        for entity in &config.entities {
            let source = builder.source(entity.name.clone(), make_source(entity)?)?;
            let mut stream = builder.transform(source, entity.table.clone(), &entity.transform)?;

            if let Some(expectations) = &entity.expectations {
                stream = builder.validate(stream, expectations)?;
            }

            match &entity.mode {
                TableMode::Append => builder.append_table(stream)?,
                TableMode::Cdc {
                    keys, sequence_by, ..
                } => builder.merge_table(stream, keys.clone(), sequence_by.clone())?,
            };
        }

        for view in &config.views {
            builder.view_from_config(view)?;
        }

        builder.build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn nodes(&self) -> &[TableNode] {
        &self.nodes
    }

    pub fn batch(&self) -> &BatchConfig {
        &self.batch
    }

    pub fn table(&self, name: &str) -> Option<&OutputTable> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &OutputTable> {
        self.tables.values()
    }

    pub fn view(&self, name: &str) -> Option<&BusinessView> {
        self.views.get(name)
    }

    pub fn views(&self) -> impl Iterator<Item = &BusinessView> {
        self.views.values()
    }
}

/// Builder of a [`PipelineGraph`].
///
/// Every transform of the graph stamps records from one shared monotonic clock, so stamps are
/// unique across tables too.
#[derive(Debug)]
pub struct PipelineBuilder {
    id: String,
    clock: Arc<dyn Clock>,
    batch: BatchConfig,
    merge: MergeConfig,
    sources: BTreeMap<String, Arc<dyn Source>>,
    consumed_sources: HashSet<String>,
    nodes: Vec<TableNode>,
    tables: BTreeMap<String, OutputTable>,
    views: BTreeMap<String, BusinessView>,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            clock: Arc::new(MonotonicClock::system()),
            batch: BatchConfig::default(),
            merge: MergeConfig::default(),
            sources: BTreeMap::new(),
            consumed_sources: HashSet::new(),
            nodes: Vec::new(),
            tables: BTreeMap::new(),
            views: BTreeMap::new(),
        }
    }

    /// Replaces the processing clock used by every transform created afterwards.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }

    /// Registers a source under `name`.
    pub fn source(
        &mut self,
        name: impl Into<String>,
        source: Arc<dyn Source>,
    ) -> SilverResult<SourcePort> {
        let name = name.into();
        if self.sources.contains_key(&name) {
            bail!(
                ErrorKind::InvalidPipeline,
                "Duplicate source",
                format!("a source named `{name}` is already registered")
            );
        }

        self.sources.insert(name.clone(), source);

        Ok(SourcePort { source: name })
    }

    /// Connects a transform to `source`, producing the stream of table `table`.
    pub fn transform(
        &mut self,
        source: SourcePort,
        table: impl Into<String>,
        config: &TransformConfig,
    ) -> SilverResult<StreamPort> {
        let table = table.into();
        self.ensure_name_is_free(&table)?;

        if !self.consumed_sources.insert(source.source.clone()) {
            bail!(
                ErrorKind::InvalidPipeline,
                "Source already connected",
                format!("source `{}` already feeds a table", source.source)
            );
        }

        let transform = TransformStage::new(table.as_str(), config, self.clock.clone());

        Ok(StreamPort {
            source: source.source,
            table,
            transform: Arc::new(transform),
            validator: None,
        })
    }

    /// Gates `stream` with the rules of `config`.
    pub fn validate(
        &mut self,
        mut stream: StreamPort,
        config: &ExpectationsConfig,
    ) -> SilverResult<StreamPort> {
        if stream.validator.is_some() {
            bail!(
                ErrorKind::InvalidPipeline,
                "Stream already validated",
                format!("the stream of table `{}` already has a validator", stream.table)
            );
        }

        let validator = RowValidator::new(stream.table.as_str(), config)?;
        stream.validator = Some(Arc::new(validator));

        Ok(stream)
    }

    /// Terminates `stream` in an append-only table.
    pub fn append_table(&mut self, stream: StreamPort) -> SilverResult<TablePort> {
        let table = AppendOnlyTable::new(stream.table.as_str());
        self.add_table(stream, TableSink::Append(table))
    }

    /// Terminates `stream` in a current-state table keyed by `keys` and sequenced by `sequence_by`.
    pub fn merge_table(
        &mut self,
        stream: StreamPort,
        keys: Vec<String>,
        sequence_by: impl Into<String>,
    ) -> SilverResult<TablePort> {
        if keys.is_empty() {
            bail!(
                ErrorKind::InvalidPipeline,
                "Missing business key",
                format!("current-state table `{}` needs at least one key column", stream.table)
            );
        }

        let table = CurrentStateTable::with_change_feed_retention(
            stream.table.as_str(),
            keys,
            sequence_by,
            self.merge.shards,
            self.merge.change_feed_retention,
        );
        let sink = TableSink::Merge {
            table,
            partitions: self.merge.partitions,
        };

        self.add_table(stream, sink)
    }

    /// Declares a view joining `base` with `joins` in order.
    pub fn view(
        &mut self,
        name: impl Into<String>,
        base: &TablePort,
        joins: Vec<(&TablePort, String)>,
        drop_columns: Vec<String>,
    ) -> SilverResult<ViewPort> {
        let name = name.into();
        self.ensure_name_is_free(&name)?;

        let base = self.lookup_table(&name, &base.table)?;
        let joins = joins
            .into_iter()
            .map(|(table, key)| -> SilverResult<ViewJoin> {
                Ok(ViewJoin {
                    table: self.lookup_table(&name, &table.table)?,
                    key,
                })
            })
            .collect::<SilverResult<Vec<_>>>()?;

        let view = BusinessView::new(name.as_str(), base, joins, drop_columns);
        self.views.insert(name.clone(), view);

        debug!(view = %name, "added view to pipeline graph");

        Ok(ViewPort { view: name })
    }

    fn view_from_config(&mut self, config: &ViewConfig) -> SilverResult<ViewPort> {
        let base = TablePort {
            table: config.base.clone(),
        };
        let joins = config
            .joins
            .iter()
            .map(|join| {
                (
                    TablePort {
                        table: join.table.clone(),
                    },
                    join.key.clone(),
                )
            })
            .collect::<Vec<_>>();

        self.view(
            config.name.clone(),
            &base,
            joins.iter().map(|(port, key)| (port, key.clone())).collect(),
            config.drop_columns.clone(),
        )
    }

    /// Finishes the graph, every registered source must feed a table.
    pub fn build(self) -> SilverResult<PipelineGraph> {
        let unconnected = self
            .sources
            .keys()
            .filter(|name| !self.consumed_sources.contains(*name))
            .cloned()
            .collect::<Vec<_>>();

        if !unconnected.is_empty() {
            bail!(
                ErrorKind::InvalidPipeline,
                "Unconnected sources",
                format!("sources {} do not feed any table", unconnected.join(", "))
            );
        }

        Ok(PipelineGraph {
            id: self.id,
            nodes: self.nodes,
            tables: self.tables,
            views: self.views,
            batch: self.batch,
        })
    }

    fn add_table(&mut self, stream: StreamPort, sink: TableSink) -> SilverResult<TablePort> {
        self.ensure_name_is_free(&stream.table)?;

        let Some(source) = self.sources.get(&stream.source).cloned() else {
            bail!(
                ErrorKind::InvalidPipeline,
                "Unknown source",
                format!("source `{}` is not registered", stream.source)
            );
        };

        let operator = TableOperator::new(stream.transform, stream.validator, sink);
        self.tables.insert(stream.table.clone(), operator.table());
        self.nodes.push(TableNode { source, operator });

        debug!(table = %stream.table, source = %stream.source, "added table to pipeline graph");

        Ok(TablePort {
            table: stream.table,
        })
    }

    fn lookup_table(&self, view: &str, table: &str) -> SilverResult<OutputTable> {
        match self.tables.get(table) {
            Some(table) => Ok(table.clone()),
            None => bail!(
                ErrorKind::InvalidPipeline,
                "Unknown view input",
                format!("view `{view}` reads from unknown table `{table}`")
            ),
        }
    }

    fn ensure_name_is_free(&self, name: &str) -> SilverResult<()> {
        if self.tables.contains_key(name) || self.views.contains_key(name) {
            bail!(
                ErrorKind::InvalidPipeline,
                "Duplicate table or view",
                format!("a table or view named `{name}` already exists")
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemorySource;

    fn memory(name: &str) -> Arc<dyn Source> {
        Arc::new(MemorySource::new(name))
    }

    #[test]
    fn builds_tables_and_views() {
        let mut builder = PipelineBuilder::new("test");

        let bookings = builder.source("bookings", memory("bookings")).unwrap();
        let bookings = builder
            .transform(bookings, "silver_bookings", &TransformConfig::default())
            .unwrap();
        let bookings = builder.append_table(bookings).unwrap();

        let flights = builder.source("flights", memory("flights")).unwrap();
        let flights = builder
            .transform(flights, "silver_flights", &TransformConfig::default())
            .unwrap();
        let flights = builder
            .merge_table(flights, vec!["flight_id".to_string()], "modifiedDate")
            .unwrap();

        let view = builder
            .view(
                "silver_business",
                &bookings,
                vec![(&flights, "flight_id".to_string())],
                vec!["modifiedDate".to_string()],
            )
            .unwrap();

        let graph = builder.build().unwrap();

        assert_eq!(graph.nodes().len(), 2);
        assert!(graph.table("silver_flights").unwrap().as_current_state().is_some());
        assert!(graph.table("silver_bookings").unwrap().as_append().is_some());
        assert!(graph.view(view.name()).is_some());
    }

    #[test]
    fn rejects_duplicate_tables() {
        let mut builder = PipelineBuilder::new("test");

        let first = builder.source("a", memory("a")).unwrap();
        let first = builder
            .transform(first, "silver", &TransformConfig::default())
            .unwrap();
        builder.append_table(first).unwrap();

        let second = builder.source("b", memory("b")).unwrap();
        let err = builder
            .transform(second, "silver", &TransformConfig::default())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidPipeline);
    }

    #[test]
    fn rejects_unconnected_sources() {
        let mut builder = PipelineBuilder::new("test");
        let _ = builder.source("bookings", memory("bookings")).unwrap();

        let err = builder.build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPipeline);
    }

    #[test]
    fn invalid_config_is_rejected_before_building() {
        let config: PipelineConfig = serde_json::from_value(serde_json::json!({
            "id": "test",
            "entities": [
                {"name": "flights", "table": "silver_flights",
                 "source": {"path": "flights.jsonl"},
                 "mode": {"type": "cdc", "keys": []}}
            ]
        }))
        .unwrap();

        let err = PipelineGraph::from_config(&config, |entity| Ok(memory(&entity.name)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
