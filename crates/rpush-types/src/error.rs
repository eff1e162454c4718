use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::destination::{DestinationTypeId, ResultType};
use crate::ids::{DestinationId, TableId};

/// Coarse failure category for a pipeline error, used for observability and
/// for rendering a stable `Failed` cause without leaking an opaque `dyn
/// Error` across the status boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The evaluator failed to produce, or failed while producing, a row stream.
    Evaluator,
    /// The renderer failed to transform rows into bytes.
    Render,
    /// The sink failed to consume the byte stream.
    Sink,
    /// Catch-all bucket when no specific category applies.
    Uncategorized,
}

/// Structured payload for a pipeline failure.
///
/// This is the "message-bearing opaque error value" a `Failed` status
/// carries: stable enough to classify (`kind`) and display (`message`),
/// with optional low-level `detail` for triage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// The exhaustive set of start-time / cancel-time errors the public facade
/// can return. These never describe a pipeline failure — see
/// [`ExecutionError`] for that.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PushError {
    #[error("destination {0} not found")]
    DestinationNotFound(DestinationId),

    #[error("table {0} not found")]
    TableNotFound(TableId),

    #[error("destination type {type_id:?} does not support format {format:?}")]
    FormatNotSupported {
        type_id: DestinationTypeId,
        format: ResultType,
    },

    #[error("push already running for table {table} on destination {destination}")]
    PushAlreadyRunning {
        table: TableId,
        destination: DestinationId,
    },
}
