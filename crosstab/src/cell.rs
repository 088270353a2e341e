//! FILENAME: crosstab/src/cell.rs
//! One bucket of the cross-tab: an accumulator per aggregation, all fed the
//! same records.

use crate::aggregator::{Aggregator, AggregatorFactory, EMPTY_AGGREGATOR};
use crate::definition::AggregationIndex;
use crate::record::Record;

#[derive(Debug, Clone)]
pub struct AggregationCell {
    instances: Vec<Aggregator>,
}

impl AggregationCell {
    /// Creates one fresh accumulator per factory, in aggregation order.
    pub fn new(factories: &[AggregatorFactory]) -> Self {
        AggregationCell {
            instances: factories.iter().map(AggregatorFactory::create).collect(),
        }
    }

    pub fn push(&mut self, record: &Record) {
        for instance in &mut self.instances {
            instance.push(record);
        }
    }

    pub fn instance(&self, index: usize) -> Option<&Aggregator> {
        self.instances.get(index)
    }

    /// Resolves `key` (spec key, then aggregator name, then the primary
    /// aggregation) to this cell's accumulator.
    pub fn get_instance(&self, key: Option<&str>, index: &AggregationIndex) -> &Aggregator {
        self.instance(index.resolve(key))
            .or_else(|| self.instances.first())
            .unwrap_or(&*EMPTY_AGGREGATOR)
    }

    pub fn instances(&self) -> &[Aggregator] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
