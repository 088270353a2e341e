//! FILENAME: crosstab/src/error.rs

use thiserror::Error;

/// Configuration errors. Raised while building a `PivotData`; a failed
/// construction never hands back a partially built engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PivotError {
    #[error("No aggregations configured")]
    EmptyAggregations,

    #[error("Unknown aggregator: {0}")]
    UnknownAggregator(String),

    #[error("Unrecognized input: {0}")]
    UnrecognizedInput(String),

    #[error("Aggregation {index} has no aggregator name and no default is available")]
    MissingAggregatorName { index: usize },
}

pub type Result<T> = std::result::Result<T, PivotError>;
