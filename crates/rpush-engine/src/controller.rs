use std::collections::HashMap;
use std::sync::Arc;

use rpush_registry::PushRegistry;
use rpush_types::{
    Condition, Destination, DestinationId, PushError, PushKey, PushRecord, PushSpec, TableId,
};
use tracing::{debug, instrument};

use crate::collaborators::{DestinationStore, TableStore};
use crate::job_manager::JobManager;
use crate::pipeline::PipelineBuilder;

/// Public facade: the six push operations, composed from table/destination
/// lookups, the registry, and the job manager. Generic only over which
/// table store and destination store implementation it talks to — the
/// evaluator lives behind [`PipelineBuilder`] and the job manager is a
/// concrete type, so neither needs a type parameter here.
pub struct PushController {
    tables: Arc<dyn TableStore>,
    destinations: Arc<dyn DestinationStore>,
    registry: Arc<PushRegistry>,
    jobs: Arc<JobManager>,
    pipeline: PipelineBuilder,
}

impl PushController {
    pub fn new(
        tables: Arc<dyn TableStore>,
        destinations: Arc<dyn DestinationStore>,
        registry: Arc<PushRegistry>,
        jobs: Arc<JobManager>,
        pipeline: PipelineBuilder,
    ) -> Self {
        Self {
            tables,
            destinations,
            registry,
            jobs,
            pipeline,
        }
    }

    /// Resolve destination, table, and sink, admit the key, and submit the
    /// pipeline. Errors from resolution never create a record; a pipeline
    /// whose evaluator fails synchronously still does, because admission
    /// happens before the activity is polled.
    #[instrument(skip(self, spec), fields(%table, %destination))]
    pub async fn start(
        &self,
        table: TableId,
        destination: DestinationId,
        spec: PushSpec,
    ) -> Condition {
        let destination_ref = match self.destinations.lookup_destination(destination).await {
            Some(d) => d,
            None => return Condition::Abnormal(PushError::DestinationNotFound(destination)),
        };
        self.start_against(table, destination, &destination_ref, spec)
            .await
            .into()
    }

    /// The per-table body of `start`, against an already-resolved
    /// destination. Used directly by `start_many` so every entry shares one
    /// destination lookup instead of repeating it per table.
    async fn start_against(
        &self,
        table: TableId,
        destination: DestinationId,
        destination_ref: &Destination,
        spec: PushSpec,
    ) -> Result<(), PushError> {
        let table_ref = match self.tables.lookup_table(table).await {
            Some(t) => t,
            None => return Err(PushError::TableNotFound(table)),
        };
        let sink = match destination_ref.sink_for(spec.format) {
            Some(s) => s.clone(),
            None => {
                return Err(PushError::FormatNotSupported {
                    type_id: destination_ref.type_id.clone(),
                    format: spec.format,
                })
            }
        };

        let key = PushKey::new(table, destination);
        self.registry.admit(key, spec.clone()).await?;

        let token = self.jobs.make_token();
        let activity = self
            .pipeline
            .build(table_ref.query.clone(), spec, Arc::clone(&sink.consumer), token.clone());
        self.jobs.submit(key, token, activity).await;

        debug!(%key, "push admitted and submitted");
        Ok(())
    }

    /// Start every entry against the same destination, resolved once up
    /// front — started pushes are independent and are not rolled back if
    /// siblings fail to start. If the destination itself can't be resolved,
    /// every entry fails with `DestinationNotFound` without any per-table
    /// lookups.
    pub async fn start_many(
        &self,
        destination: DestinationId,
        entries: HashMap<TableId, PushSpec>,
    ) -> HashMap<TableId, PushError> {
        let destination_ref = match self.destinations.lookup_destination(destination).await {
            Some(d) => d,
            None => {
                return entries
                    .into_keys()
                    .map(|table| (table, PushError::DestinationNotFound(destination)))
                    .collect()
            }
        };

        let mut failures = HashMap::new();
        for (table, spec) in entries {
            if let Err(e) = self
                .start_against(table, destination, &destination_ref, spec)
                .await
            {
                failures.insert(table, e);
            }
        }
        failures
    }

    /// Cancel the activity for `(table, destination)`. A no-op that still
    /// returns `Normal` when no activity is live (already terminal or
    /// never started).
    #[instrument(skip(self), fields(%table, %destination))]
    pub async fn cancel(&self, table: TableId, destination: DestinationId) -> Condition {
        if self.destinations.lookup_destination(destination).await.is_none() {
            return Condition::Abnormal(PushError::DestinationNotFound(destination));
        }
        if self.tables.lookup_table(table).await.is_none() {
            return Condition::Abnormal(PushError::TableNotFound(table));
        }

        let key = PushKey::new(table, destination);
        self.jobs.cancel(key).await;
        Condition::Normal
    }

    /// Cancel every id against one destination lookup. An id whose table
    /// cannot be resolved contributes a `TableNotFound` entry; every other
    /// id is attempted regardless of earlier failures.
    pub async fn cancel_many(
        &self,
        destination: DestinationId,
        ids: Vec<TableId>,
    ) -> HashMap<TableId, PushError> {
        if self.destinations.lookup_destination(destination).await.is_none() {
            return ids
                .into_iter()
                .map(|id| (id, PushError::DestinationNotFound(destination)))
                .collect();
        }

        let mut failures = HashMap::new();
        for table in ids {
            if self.tables.lookup_table(table).await.is_none() {
                failures.insert(table, PushError::TableNotFound(table));
                continue;
            }
            self.jobs.cancel(PushKey::new(table, destination)).await;
        }
        failures
    }

    /// Cancel every activity this controller's job manager currently
    /// tracks. Infallible by construction.
    pub async fn cancel_all(&self) {
        self.jobs.cancel_all().await;
    }

    /// All known records (running or terminal) for `destination`.
    pub async fn destination_status(
        &self,
        destination: DestinationId,
    ) -> Result<HashMap<TableId, PushRecord>, PushError> {
        if self.destinations.lookup_destination(destination).await.is_none() {
            return Err(PushError::DestinationNotFound(destination));
        }
        Ok(self.registry.snapshot_for_destination(destination).await)
    }
}
