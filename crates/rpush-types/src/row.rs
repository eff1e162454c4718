use std::pin::Pin;

use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// One cell's value, tagged by the same closed set as [`crate::ColumnType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Null,
}

/// One row of a query result, in column order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row(pub Vec<CellValue>);

/// A lazy, finite, cancellable row stream produced by the evaluator.
pub type RowStream = Pin<Box<dyn Stream<Item = Result<Row, ExecutionError>> + Send>>;
