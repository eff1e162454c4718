use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rpush_registry::StatusRecorder;
use rpush_types::{PushKey, PushOutcome};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One tracked activity: its cancellation token, and the generation it was
/// submitted under.
///
/// The generation guards against a race between a completing task removing
/// its own map entry and a subsequent `start` for the same key replacing
/// that entry first — the completing task only removes the entry if its
/// generation still matches what is there.
struct ActivityHandle {
    generation: u64,
    token: CancellationToken,
}

/// Owns one spawned task per live [`PushKey`] and the cancellation token
/// that task observes.
///
/// Tokens are independent (`CancellationToken::new()`), never children of a
/// shared parent: `tokio_util`'s `child_token()` cancels any child created
/// after the parent already fired, which would make the manager permanently
/// unable to accept new pushes after one `cancel_all`. `cancel_all` instead
/// walks every tracked token and cancels each individually.
pub struct JobManager {
    recorder: Arc<StatusRecorder>,
    activities: Arc<Mutex<HashMap<PushKey, ActivityHandle>>>,
    next_generation: AtomicU64,
}

impl JobManager {
    pub fn new(recorder: Arc<StatusRecorder>) -> Self {
        Self {
            recorder,
            activities: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// A fresh token for a new activity. Callers pass a clone into the
    /// activity future and the original into [`Self::submit`].
    pub fn make_token(&self) -> CancellationToken {
        CancellationToken::new()
    }

    /// Track `activity` under `key` and spawn it. `token` must be the same
    /// token (or an ancestor-free clone of it) the activity observes for
    /// cancellation.
    ///
    /// On completion the activity's [`PushOutcome`] is handed to the status
    /// recorder, then the map entry is removed if no later `submit` for the
    /// same key has already replaced it.
    pub async fn submit<F>(&self, key: PushKey, token: CancellationToken, activity: F)
    where
        F: Future<Output = PushOutcome> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut activities = self.activities.lock().await;
            activities.insert(key, ActivityHandle { generation, token });
        }

        let activities = Arc::clone(&self.activities);
        let recorder = Arc::clone(&self.recorder);
        tokio::spawn(async move {
            let outcome = activity.await;
            debug!(%key, ?outcome, "activity completed");
            recorder.on_completion(key, outcome).await;

            let mut activities = activities.lock().await;
            if activities
                .get(&key)
                .is_some_and(|handle| handle.generation == generation)
            {
                activities.remove(&key);
            }
        });
    }

    /// Cancel the activity tracked under `key`, if any. A no-op if `key`
    /// has no live activity.
    pub async fn cancel(&self, key: PushKey) {
        let activities = self.activities.lock().await;
        if let Some(handle) = activities.get(&key) {
            handle.token.cancel();
        }
    }

    /// Cancel every currently tracked activity.
    pub async fn cancel_all(&self) {
        let activities = self.activities.lock().await;
        for handle in activities.values() {
            handle.token.cancel();
        }
    }

    /// Whether `key` currently has a live (not yet completed) activity.
    pub async fn is_active(&self, key: PushKey) -> bool {
        self.activities.lock().await.contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rpush_registry::PushRegistry;
    use rpush_types::{ColumnMeta, ColumnType, DestinationId, PushSpec, ResourcePath, ResultType, TableId};
    use tokio::sync::oneshot;

    use super::*;

    fn spec() -> PushSpec {
        PushSpec {
            columns: vec![ColumnMeta::new("a", ColumnType::Text)],
            destination_path: ResourcePath("/foo".into()),
            format: ResultType::Csv,
            limit: None,
        }
    }

    fn manager() -> (JobManager, Arc<PushRegistry>) {
        let registry = Arc::new(PushRegistry::default());
        let recorder = Arc::new(StatusRecorder::new(Arc::clone(&registry)));
        (JobManager::new(recorder), registry)
    }

    #[tokio::test]
    async fn submitted_activity_records_its_outcome() {
        let (jobs, registry) = manager();
        let key = PushKey::new(TableId(1), DestinationId(1));
        registry.admit(key, spec()).await.unwrap();

        let token = jobs.make_token();
        jobs.submit(key, token, async { PushOutcome::Finished }).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let record = registry.status_for(key).await.unwrap();
        assert!(matches!(record.status, rpush_types::PushStatus::Finished { .. }));
        assert!(!jobs.is_active(key).await);
    }

    #[tokio::test]
    async fn cancel_triggers_the_activitys_token() {
        let (jobs, registry) = manager();
        let key = PushKey::new(TableId(2), DestinationId(2));
        registry.admit(key, spec()).await.unwrap();

        let token = jobs.make_token();
        let activity_token = token.clone();
        let (started_tx, started_rx) = oneshot::channel();
        jobs.submit(key, token, async move {
            started_tx.send(()).ok();
            activity_token.cancelled().await;
            PushOutcome::Canceled
        })
        .await;

        started_rx.await.unwrap();
        assert!(jobs.is_active(key).await);
        jobs.cancel(key).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let record = registry.status_for(key).await.unwrap();
        assert!(matches!(record.status, rpush_types::PushStatus::Canceled { .. }));
    }

    #[tokio::test]
    async fn cancel_all_reaches_every_tracked_activity() {
        let (jobs, registry) = manager();
        let k1 = PushKey::new(TableId(1), DestinationId(1));
        let k2 = PushKey::new(TableId(2), DestinationId(1));
        registry.admit(k1, spec()).await.unwrap();
        registry.admit(k2, spec()).await.unwrap();

        for key in [k1, k2] {
            let token = jobs.make_token();
            let activity_token = token.clone();
            jobs.submit(key, token, async move {
                activity_token.cancelled().await;
                PushOutcome::Canceled
            })
            .await;
        }

        jobs.cancel_all().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        for key in [k1, k2] {
            let record = registry.status_for(key).await.unwrap();
            assert!(matches!(record.status, rpush_types::PushStatus::Canceled { .. }));
        }
    }

    #[tokio::test]
    async fn a_second_submit_survives_the_first_activitys_late_cleanup() {
        let (jobs, registry) = manager();
        let key = PushKey::new(TableId(3), DestinationId(3));
        registry.admit(key, spec()).await.unwrap();

        let (release_tx, release_rx) = oneshot::channel();
        let first_token = jobs.make_token();
        jobs.submit(key, first_token, async move {
            release_rx.await.ok();
            PushOutcome::Finished
        })
        .await;

        registry.record_outcome(key, PushOutcome::Canceled).await;
        registry.admit(key, spec()).await.unwrap();

        let second_token = jobs.make_token();
        jobs.submit(key, second_token, async { PushOutcome::Finished })
            .await;

        release_tx.send(()).ok();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!jobs.is_active(key).await);
    }
}
