use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use rpush_types::{ExecutionError, PushOutcome, PushSpec, ResultType, SinkConsumer};
use tokio_util::sync::CancellationToken;

use crate::collaborators::Evaluator;
use crate::render::{render_csv, render_json, CsvRenderConfig, JsonRenderConfig};
use crate::ByteStream;

type Activity = Pin<Box<dyn Future<Output = PushOutcome> + Send>>;

/// Wraps a stream so it stops yielding as soon as `token` is cancelled,
/// marking `cancelled` when it does.
///
/// Races each call to the inner stream's `next()` against `token.cancelled()`
/// with a biased `select!`, the same pattern `pipeline_manager.rs` uses to
/// interrupt a running stage: a synchronous `is_cancelled()` check inside
/// `take_while` would never be polled again once the inner stream parks on
/// a non-self-waking `.await` (a blocked evaluator, a slow sink write), so
/// cancellation would never actually interrupt it. Racing the two futures
/// means the token's waker fires the moment `cancel()` is called, regardless
/// of what the inner stream is suspended on.
fn cancel_aware<T: Send + 'static>(
    token: CancellationToken,
    cancelled: Arc<AtomicBool>,
    stream: Pin<Box<dyn futures_core::Stream<Item = Result<T, ExecutionError>> + Send>>,
) -> Pin<Box<dyn futures_core::Stream<Item = Result<T, ExecutionError>> + Send>> {
    Box::pin(futures_util::stream::unfold(
        (stream, token, cancelled),
        |(mut stream, token, cancelled)| async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    cancelled.store(true, Ordering::SeqCst);
                    None
                }
                item = stream.next() => item.map(|item| (item, (stream, token, cancelled))),
            }
        },
    ))
}

/// Composes the evaluate -> render -> sink stages into one cancellable
/// activity future.
///
/// Built fresh per push rather than reused, since each push closes over its
/// own query, spec, sink, and cancellation token.
pub struct PipelineBuilder {
    evaluator: Arc<dyn Evaluator>,
}

impl PipelineBuilder {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self { evaluator }
    }

    /// Build the activity for one push. The returned future performs no
    /// work until polled — admission must already have happened by the
    /// time the caller spawns it, so a synchronous evaluator failure still
    /// transitions a `Running` record rather than racing it.
    pub fn build(
        &self,
        query: String,
        spec: PushSpec,
        sink: Arc<dyn SinkConsumer>,
        token: CancellationToken,
    ) -> Activity {
        let evaluator = Arc::clone(&self.evaluator);

        Box::pin(async move {
            if token.is_cancelled() {
                return PushOutcome::Canceled;
            }

            let rows = match evaluator.evaluate(&query).await {
                Ok(rows) => rows,
                Err(e) => return PushOutcome::Failed(e),
            };

            let cancelled = Arc::new(AtomicBool::new(false));
            let rows = cancel_aware(token.clone(), Arc::clone(&cancelled), rows);

            let columns = spec.columns.clone();
            let bytes: ByteStream = match spec.format {
                ResultType::Csv => {
                    render_csv(rows, columns.clone(), CsvRenderConfig::default(), spec.limit)
                }
                ResultType::Json => {
                    render_json(rows, columns.clone(), JsonRenderConfig::default(), spec.limit)
                }
            };
            let bytes = cancel_aware(token.clone(), Arc::clone(&cancelled), bytes);

            match sink.consume(&spec.destination_path, &columns, bytes).await {
                Ok(()) if cancelled.load(Ordering::SeqCst) => PushOutcome::Canceled,
                Ok(()) => PushOutcome::Finished,
                Err(e) => PushOutcome::Failed(e),
            }
        })
    }
}
