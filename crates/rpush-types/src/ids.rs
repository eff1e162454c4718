use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle for a table definition, as minted by the table store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(pub u64);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

/// Opaque handle for a destination, as minted by the destination store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationId(pub u64);

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "destination#{}", self.0)
    }
}

/// Admission, cancellation, and status-lookup key: one push per pair is live
/// at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PushKey {
    pub table: TableId,
    pub destination: DestinationId,
}

impl PushKey {
    pub fn new(table: TableId, destination: DestinationId) -> Self {
        Self { table, destination }
    }
}

impl fmt::Display for PushKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {})", self.table, self.destination)
    }
}
