use serde::{Deserialize, Serialize};

/// Closed set of column data types, concrete enough to drive CSV/JSON
/// rendering without depending on an external schema crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

/// One column of a table's result shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A table definition as resolved by the table store.
///
/// `columns` is ordered; rendering and sink consumption both rely on that
/// order matching `query`'s projection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub query: String,
    pub columns: Vec<ColumnMeta>,
}
