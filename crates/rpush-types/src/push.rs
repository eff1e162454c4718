use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::destination::ResultType;
use crate::error::{ExecutionError, PushError};
use crate::table::ColumnMeta;

/// Where a sink should write the pushed rows, opaque to the core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePath(pub String);

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The configuration of a single push, fixed at admission time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSpec {
    pub columns: Vec<ColumnMeta>,
    pub destination_path: ResourcePath,
    pub format: ResultType,
    pub limit: Option<u64>,
}

/// Per-key lifecycle status. Terminal variants ([`PushStatus::Finished`],
/// [`PushStatus::Canceled`], [`PushStatus::Failed`]) are reached exactly
/// once per [`PushRecord`]; a subsequent `start` replaces the record rather
/// than mutating it back to `Running`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PushStatus {
    Running {
        since: DateTime<Utc>,
    },
    Finished {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },
    Canceled {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },
    Failed {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        cause: ExecutionError,
    },
}

impl PushStatus {
    /// Whether the status is one of the three terminal variants.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PushStatus::Running { .. })
    }

    /// The `since` timestamp common to every variant.
    pub fn since(&self) -> DateTime<Utc> {
        match self {
            PushStatus::Running { since }
            | PushStatus::Finished { since, .. }
            | PushStatus::Canceled { since, .. }
            | PushStatus::Failed { since, .. } => *since,
        }
    }
}

impl fmt::Display for PushStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushStatus::Running { .. } => write!(f, "Running"),
            PushStatus::Finished { .. } => write!(f, "Finished"),
            PushStatus::Canceled { .. } => write!(f, "Canceled"),
            PushStatus::Failed { cause, .. } => write!(f, "Failed({cause})"),
        }
    }
}

/// Terminal outcome of a pipeline activity, as reported by the job manager's
/// completion notification. Distinct from [`PushStatus`]: this is the
/// *event* the status recorder folds into a status, not the status itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PushOutcome {
    Finished,
    Canceled,
    Failed(ExecutionError),
}

/// The full record the registry holds for one [`crate::PushKey`]: its
/// configuration, admission time, and current status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushRecord {
    pub spec: PushSpec,
    pub started_at: DateTime<Utc>,
    pub status: PushStatus,
}

/// Success/abnormal result of `start` and `cancel`. Kept as a dedicated type
/// rather than `Result<(), PushError>` so call sites read the outcome by
/// name, while still composing with `?` via `Condition::ok`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Normal,
    Abnormal(PushError),
}

impl Condition {
    pub fn is_normal(&self) -> bool {
        matches!(self, Condition::Normal)
    }

    /// Converts to `Result<(), PushError>` for callers that prefer `?`.
    pub fn ok(self) -> Result<(), PushError> {
        match self {
            Condition::Normal => Ok(()),
            Condition::Abnormal(e) => Err(e),
        }
    }
}

impl From<PushError> for Condition {
    fn from(e: PushError) -> Self {
        Condition::Abnormal(e)
    }
}

impl From<Result<(), PushError>> for Condition {
    fn from(r: Result<(), PushError>) -> Self {
        match r {
            Ok(()) => Condition::Normal,
            Err(e) => Condition::Abnormal(e),
        }
    }
}
