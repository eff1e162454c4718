use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::push::ResourcePath;
use crate::table::ColumnMeta;

/// A lazy, finite, cancellable byte stream: produced incrementally, always
/// terminates, and propagates an error value as a terminal event.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ExecutionError>> + Send>>;

/// Identifies a destination implementation and its protocol version.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationTypeId {
    pub name: String,
    pub version: String,
}

impl fmt::Display for DestinationTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Serialization format a sink can accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultType {
    Csv,
    Json,
}

/// Consumer coroutine for one sink: writes a byte stream to `path` and
/// terminates when the stream terminates.
#[async_trait]
pub trait SinkConsumer: Send + Sync {
    async fn consume(
        &self,
        path: &ResourcePath,
        columns: &[ColumnMeta],
        bytes: ByteStream,
    ) -> Result<(), ExecutionError>;
}

/// One format a destination supports, paired with the coroutine that writes it.
#[derive(Clone)]
pub struct Sink {
    pub result_type: ResultType,
    pub consumer: Arc<dyn SinkConsumer>,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("result_type", &self.result_type)
            .finish_non_exhaustive()
    }
}

/// An external sink, identified by a handle, exposing one or more [`Sink`]s.
///
/// `sinks` must be non-empty; constructors enforce this.
#[derive(Clone, Debug)]
pub struct Destination {
    pub type_id: DestinationTypeId,
    sinks: Vec<Sink>,
}

impl Destination {
    /// Returns `None` if `sinks` is empty — callers are expected to treat
    /// that as a construction-time programmer error, not a runtime `PushError`.
    pub fn new(type_id: DestinationTypeId, sinks: Vec<Sink>) -> Option<Self> {
        if sinks.is_empty() {
            return None;
        }
        Some(Self { type_id, sinks })
    }

    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    /// Select the sink matching `format`.
    pub fn sink_for(&self, format: ResultType) -> Option<&Sink> {
        self.sinks.iter().find(|s| s.result_type == format)
    }
}
