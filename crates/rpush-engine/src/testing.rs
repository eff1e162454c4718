//! In-process test doubles for the four external collaborators. Used by
//! this crate's own integration tests and exported so downstream crates
//! (the demo binary, future integration suites) don't need to reinvent them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use rpush_types::{
    ColumnMeta, Destination, DestinationId, ErrorKind, ExecutionError, ResourcePath, Row,
    RowStream, TableId, TableRef,
};

use crate::collaborators::{DestinationStore, Evaluator, TableStore};
use crate::ByteStream;

/// A fixed catalog of tables, as if retrieved from external metadata
/// storage that never changes mid-test.
#[derive(Default)]
pub struct FixtureTableStore {
    tables: HashMap<TableId, TableRef>,
}

impl FixtureTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, id: TableId, table: TableRef) -> Self {
        self.tables.insert(id, table);
        self
    }
}

#[async_trait]
impl TableStore for FixtureTableStore {
    async fn lookup_table(&self, id: TableId) -> Option<TableRef> {
        self.tables.get(&id).cloned()
    }
}

/// A fixed catalog of destinations.
#[derive(Default)]
pub struct FixtureDestinationStore {
    destinations: HashMap<DestinationId, Destination>,
}

impl FixtureDestinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_destination(mut self, id: DestinationId, destination: Destination) -> Self {
        self.destinations.insert(id, destination);
        self
    }
}

#[async_trait]
impl DestinationStore for FixtureDestinationStore {
    async fn lookup_destination(&self, id: DestinationId) -> Option<Destination> {
        self.destinations.get(&id).cloned()
    }
}

/// Scripted reaction to one query string, registered ahead of time on a
/// [`ScriptedEvaluator`].
#[derive(Clone)]
pub enum ScriptedBehavior {
    /// Emit these rows, then end the stream normally.
    Rows(Vec<Row>),
    /// Fail synchronously, before a stream is ever produced.
    FailSync(ExecutionError),
    /// Emit these rows, then suspend forever — the stream only ends when
    /// externally cancelled.
    EmitThenBlock(Vec<Row>),
    /// Produce a stream that emits nothing and then raises.
    FailMidStream(ExecutionError),
}

/// An evaluator whose behavior per query string is fixed ahead of time,
/// so tests can exercise every outcome in the completion table without a
/// real query engine.
#[derive(Default)]
pub struct ScriptedEvaluator {
    scripts: Mutex<HashMap<String, ScriptedBehavior>>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, query: impl Into<String>, behavior: ScriptedBehavior) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(query.into(), behavior);
        self
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, query: &str) -> Result<RowStream, ExecutionError> {
        let behavior = {
            let scripts = self.scripts.lock().unwrap();
            scripts.get(query).cloned()
        };

        match behavior {
            Some(ScriptedBehavior::Rows(rows)) => Ok(Box::pin(stream::iter(
                rows.into_iter().map(Ok::<Row, ExecutionError>),
            ))),
            Some(ScriptedBehavior::FailSync(e)) => Err(e),
            Some(ScriptedBehavior::EmitThenBlock(rows)) => Ok(Box::pin(
                stream::iter(rows.into_iter().map(Ok::<Row, ExecutionError>))
                    .chain(stream::pending()),
            )),
            Some(ScriptedBehavior::FailMidStream(e)) => {
                Ok(Box::pin(stream::once(async move { Err(e) })))
            }
            None => Err(ExecutionError::new(
                ErrorKind::Uncategorized,
                format!("no script registered for query {query:?}"),
            )),
        }
    }
}

/// A sink that records everything written to each path in memory, so tests
/// can assert on delivered bytes without touching a filesystem.
#[derive(Default, Clone)]
pub struct RecordingSink {
    written: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.written.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl rpush_types::SinkConsumer for RecordingSink {
    async fn consume(
        &self,
        path: &ResourcePath,
        _columns: &[ColumnMeta],
        mut bytes: ByteStream,
    ) -> Result<(), ExecutionError> {
        let mut buf = Vec::new();
        while let Some(chunk) = bytes.next().await {
            buf.extend_from_slice(&chunk?);
        }
        self.written.lock().unwrap().insert(path.0.clone(), buf);
        Ok(())
    }
}
