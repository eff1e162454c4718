use async_trait::async_trait;
use rpush_types::{Destination, DestinationId, ExecutionError, RowStream, TableId, TableRef};

/// Table lookup. Pure, safe to call concurrently, never mutates.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn lookup_table(&self, id: TableId) -> Option<TableRef>;
}

/// Destination lookup. Same properties as [`TableStore`].
#[async_trait]
pub trait DestinationStore: Send + Sync {
    async fn lookup_destination(&self, id: DestinationId) -> Option<Destination>;
}

/// Query evaluator. May fail before producing a stream; the produced
/// stream is lazily consumed and may itself fail mid-stream.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, query: &str) -> Result<RowStream, ExecutionError>;
}
