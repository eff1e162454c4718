use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rpush_types::{
    Clock, DestinationId, PushError, PushKey, PushOutcome, PushRecord, PushSpec, PushStatus,
    SystemClock, TableId,
};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::retention::RetentionConfig;

/// In-memory map from [`PushKey`] to [`PushRecord`], plus the admission lock
/// that enforces "at most one `Running` record per key".
///
/// `admission` serializes the create-or-reject decision across all keys
/// with a single process-wide lock; the critical section is O(1) and
/// performs no I/O. Reads (`status_for`, `snapshot_for_destination`) never
/// take `admission`; they only take the `records` read lock, so
/// `destination_status` never serializes behind a slow `start`.
pub struct PushRegistry {
    clock: Arc<dyn Clock>,
    admission: Mutex<()>,
    records: RwLock<HashMap<PushKey, PushRecord>>,
    retention: RetentionConfig,
    terminal_order: Mutex<HashMap<DestinationId, VecDeque<TableId>>>,
}

impl Default for PushRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl PushRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            admission: Mutex::new(()),
            records: RwLock::new(HashMap::new()),
            retention: RetentionConfig::default(),
            terminal_order: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    /// Admit a new push for `key`.
    ///
    /// Succeeds and inserts a fresh `Running` record when either no record
    /// exists for `key`, or the existing one is terminal. Fails with
    /// [`PushError::PushAlreadyRunning`] when a `Running` record already
    /// exists. The critical section (lock held) is a single `HashMap`
    /// lookup-then-insert: O(1), no I/O, guaranteeing exactly one of two
    /// concurrent `start(K)` calls wins.
    pub async fn admit(&self, key: PushKey, spec: PushSpec) -> Result<(), PushError> {
        let _admission = self.admission.lock().await;
        let mut records = self.records.write().await;

        if let Some(existing) = records.get(&key) {
            if matches!(existing.status, PushStatus::Running { .. }) {
                return Err(PushError::PushAlreadyRunning {
                    table: key.table,
                    destination: key.destination,
                });
            }
        }

        let now = self.clock.now();
        records.insert(
            key,
            PushRecord {
                spec,
                started_at: now,
                status: PushStatus::Running { since: now },
            },
        );
        Ok(())
    }

    /// Whether a `Running` record currently exists for `key`.
    ///
    /// Used by `cancel`/`cancel_many` to decide whether there is an active
    /// job-manager activity worth cancelling, without taking the admission
    /// lock.
    pub async fn is_running(&self, key: PushKey) -> bool {
        matches!(
            self.records.read().await.get(&key).map(|r| &r.status),
            Some(PushStatus::Running { .. })
        )
    }

    /// Fold a job-manager completion notification into a terminal status.
    ///
    /// An unconditional overwrite under the write lock, so no reader ever
    /// observes a torn transition. If the record is missing — this should
    /// not happen for a key with a live activity — the notification is
    /// discarded with a diagnostic rather than panicking.
    pub async fn record_outcome(&self, key: PushKey, outcome: PushOutcome) {
        let until = self.clock.now();
        let mut records = self.records.write().await;

        let Some(record) = records.get_mut(&key) else {
            warn!(%key, "status recorder notified for a key with no record");
            return;
        };

        let since = match &record.status {
            PushStatus::Running { since } => *since,
            other => {
                warn!(%key, status = %other, "status recorder notified for a non-running record");
                other.since()
            }
        };

        record.status = match outcome {
            PushOutcome::Finished => PushStatus::Finished { since, until },
            PushOutcome::Canceled => PushStatus::Canceled { since, until },
            PushOutcome::Failed(cause) => PushStatus::Failed { since, until, cause },
        };

        drop(records);
        self.track_terminal(key).await;
    }

    /// The record for `key`, if any — running or terminal.
    pub async fn status_for(&self, key: PushKey) -> Option<PushRecord> {
        self.records.read().await.get(&key).cloned()
    }

    /// All records whose key's destination matches `destination`, keyed by
    /// table. O(n) over the full registry.
    pub async fn snapshot_for_destination(
        &self,
        destination: DestinationId,
    ) -> HashMap<TableId, PushRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.destination == destination)
            .map(|(key, record)| (key.table, record.clone()))
            .collect()
    }

    /// Full registry dump for diagnostics and tests, bypassing the
    /// per-destination filter `destination_status` applies.
    pub async fn snapshot_all(&self) -> HashMap<PushKey, PushRecord> {
        self.records.read().await.clone()
    }

    /// Apply retention eviction after a record turns terminal. No-op when
    /// `retention` is unbounded (the default).
    async fn track_terminal(&self, key: PushKey) {
        let Some(cap) = self.retention.per_destination_cap else {
            return;
        };

        let mut order = self.terminal_order.lock().await;
        let queue = order.entry(key.destination).or_default();
        queue.push_back(key.table);

        while queue.len() > cap {
            let Some(oldest_table) = queue.pop_front() else {
                break;
            };
            let evict_key = PushKey::new(oldest_table, key.destination);
            let mut records = self.records.write().await;
            if matches!(
                records.get(&evict_key).map(|r| r.status.is_terminal()),
                Some(true)
            ) {
                records.remove(&evict_key);
            }
        }
    }
}
