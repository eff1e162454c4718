use std::sync::Arc;
use std::time::Duration;

use rpush_engine::testing::{
    FixtureDestinationStore, FixtureTableStore, RecordingSink, ScriptedBehavior, ScriptedEvaluator,
};
use rpush_engine::{JobManager, PipelineBuilder, PushController};
use rpush_registry::{PushRegistry, StatusRecorder};
use rpush_types::{
    CellValue, ColumnMeta, ColumnType, Condition, Destination, DestinationId, DestinationTypeId,
    ErrorKind, ExecutionError, PushError, PushSpec, PushStatus, ResourcePath, ResultType, Row,
    Sink, TableId, TableRef,
};

fn controller(
    evaluator: ScriptedEvaluator,
    tables: FixtureTableStore,
    destinations: FixtureDestinationStore,
) -> PushController {
    let registry = Arc::new(PushRegistry::default());
    let recorder = Arc::new(StatusRecorder::new(Arc::clone(&registry)));
    let jobs = Arc::new(JobManager::new(recorder));
    let pipeline = PipelineBuilder::new(Arc::new(evaluator));
    PushController::new(
        Arc::new(tables),
        Arc::new(destinations),
        registry,
        jobs,
        pipeline,
    )
}

fn csv_destination(type_name: &str, sink: RecordingSink) -> Destination {
    Destination::new(
        DestinationTypeId {
            name: type_name.into(),
            version: "1".into(),
        },
        vec![Sink {
            result_type: ResultType::Csv,
            consumer: Arc::new(sink),
        }],
    )
    .unwrap()
}

fn foo_table() -> TableRef {
    TableRef {
        name: "foo".into(),
        query: "Q".into(),
        columns: vec![ColumnMeta::new("value", ColumnType::Text)],
    }
}

fn spec_for(path: &str) -> PushSpec {
    PushSpec {
        columns: vec![ColumnMeta::new("value", ColumnType::Text)],
        destination_path: ResourcePath(path.into()),
        format: ResultType::Csv,
        limit: None,
    }
}

/// S1 — happy path.
#[tokio::test]
async fn happy_path_finishes_and_writes_expected_bytes() {
    let sink = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new().with_script(
        "Q",
        ScriptedBehavior::Rows(vec![Row(vec![CellValue::Text("evaluated(Q)".into())])]),
    );
    let tables = FixtureTableStore::new().with_table(TableId(42), foo_table());
    let destinations =
        FixtureDestinationStore::new().with_destination(DestinationId(43), csv_destination("fs", sink.clone()));
    let controller = controller(evaluator, tables, destinations);

    let outcome = controller
        .start(TableId(42), DestinationId(43), spec_for("/foo/bar"))
        .await;
    assert_eq!(outcome, Condition::Normal);

    tokio::time::sleep(Duration::from_millis(30)).await;

    let status = controller.destination_status(DestinationId(43)).await.unwrap();
    let record = status.get(&TableId(42)).unwrap();
    assert!(matches!(record.status, PushStatus::Finished { .. }));
    assert_eq!(
        sink.contents("/foo/bar").unwrap(),
        b"value\nevaluated(Q)\n".to_vec()
    );
}

/// S2 — duplicate push for the same key is rejected while the first is
/// still running.
#[tokio::test]
async fn duplicate_start_while_running_is_rejected() {
    let sink = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new()
        .with_script("Q", ScriptedBehavior::EmitThenBlock(vec![Row(vec![CellValue::Text("x".into())])]));
    let tables = FixtureTableStore::new().with_table(TableId(42), foo_table());
    let destinations =
        FixtureDestinationStore::new().with_destination(DestinationId(43), csv_destination("fs", sink));
    let controller = controller(evaluator, tables, destinations);

    let first = controller
        .start(TableId(42), DestinationId(43), spec_for("/foo/bar"))
        .await;
    assert_eq!(first, Condition::Normal);

    let second = controller
        .start(TableId(42), DestinationId(43), spec_for("/foo/bar"))
        .await;
    assert_eq!(
        second,
        Condition::Abnormal(PushError::PushAlreadyRunning {
            table: TableId(42),
            destination: DestinationId(43)
        })
    );
}

/// S3 — two different destinations for the same table both admit
/// concurrently.
#[tokio::test]
async fn two_destinations_for_one_table_both_admit() {
    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new()
        .with_script("Q", ScriptedBehavior::EmitThenBlock(vec![Row(vec![CellValue::Text("x".into())])]));
    let tables = FixtureTableStore::new().with_table(TableId(42), foo_table());
    let destinations = FixtureDestinationStore::new()
        .with_destination(DestinationId(43), csv_destination("fs", sink_a))
        .with_destination(DestinationId(44), csv_destination("fs", sink_b));
    let controller = controller(evaluator, tables, destinations);

    let a = controller
        .start(TableId(42), DestinationId(43), spec_for("/a"))
        .await;
    let b = controller
        .start(TableId(42), DestinationId(44), spec_for("/b"))
        .await;
    assert_eq!(a, Condition::Normal);
    assert_eq!(b, Condition::Normal);

    let status_a = controller.destination_status(DestinationId(43)).await.unwrap();
    let status_b = controller.destination_status(DestinationId(44)).await.unwrap();
    assert!(matches!(
        status_a.get(&TableId(42)).unwrap().status,
        PushStatus::Running { .. }
    ));
    assert!(matches!(
        status_b.get(&TableId(42)).unwrap().status,
        PushStatus::Running { .. }
    ));
}

/// S4 — missing destination and missing table both fail without creating a
/// record.
#[tokio::test]
async fn missing_destination_or_table_creates_no_record() {
    let sink = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new();

    let tables = FixtureTableStore::new().with_table(TableId(42), foo_table());
    let destinations = FixtureDestinationStore::new();
    let controller = controller(evaluator, tables, destinations);

    let missing_destination = controller
        .start(TableId(42), DestinationId(99), spec_for("/x"))
        .await;
    assert_eq!(
        missing_destination,
        Condition::Abnormal(PushError::DestinationNotFound(DestinationId(99)))
    );

    let evaluator = ScriptedEvaluator::new();
    let tables = FixtureTableStore::new();
    let destinations =
        FixtureDestinationStore::new().with_destination(DestinationId(43), csv_destination("fs", sink));
    let controller = controller(evaluator, tables, destinations);

    let missing_table = controller
        .start(TableId(42), DestinationId(43), spec_for("/x"))
        .await;
    assert_eq!(
        missing_table,
        Condition::Abnormal(PushError::TableNotFound(TableId(42)))
    );

    let status = controller.destination_status(DestinationId(43)).await.unwrap();
    assert!(status.is_empty());
}

/// S5 — cancelling after the first chunk preserves exactly that prefix.
#[tokio::test]
async fn cancel_after_first_chunk_preserves_prefix() {
    let sink = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new().with_script(
        "Q",
        ScriptedBehavior::EmitThenBlock(vec![Row(vec![CellValue::Text("foo".into())])]),
    );
    let tables = FixtureTableStore::new().with_table(TableId(42), foo_table());
    let destinations =
        FixtureDestinationStore::new().with_destination(DestinationId(43), csv_destination("fs", sink.clone()));
    let controller = controller(evaluator, tables, destinations);

    controller
        .start(TableId(42), DestinationId(43), spec_for("/foo/bar"))
        .await;

    tokio::time::sleep(Duration::from_millis(30)).await;
    let cancel_result = controller.cancel(TableId(42), DestinationId(43)).await;
    assert_eq!(cancel_result, Condition::Normal);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let status = controller.destination_status(DestinationId(43)).await.unwrap();
    assert!(matches!(
        status.get(&TableId(42)).unwrap().status,
        PushStatus::Canceled { .. }
    ));
    assert_eq!(sink.contents("/foo/bar").unwrap(), b"value\nfoo\n".to_vec());
}

/// S6 — start_many reports only the failing entries and lets the rest
/// complete independently.
#[tokio::test]
async fn start_many_reports_only_failures() {
    let sink = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new().with_script(
        "Q",
        ScriptedBehavior::Rows(vec![Row(vec![CellValue::Text("ok".into())])]),
    );
    let tables = FixtureTableStore::new().with_table(TableId(2), foo_table());
    let destinations =
        FixtureDestinationStore::new().with_destination(DestinationId(43), csv_destination("fs", sink));
    let controller = controller(evaluator, tables, destinations);

    let mut entries = std::collections::HashMap::new();
    entries.insert(TableId(1), spec_for("/one"));
    entries.insert(TableId(2), spec_for("/two"));

    let failures = controller.start_many(DestinationId(43), entries).await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures.get(&TableId(1)), Some(&PushError::TableNotFound(TableId(1))));

    tokio::time::sleep(Duration::from_millis(30)).await;
    let status = controller.destination_status(DestinationId(43)).await.unwrap();
    assert!(matches!(
        status.get(&TableId(2)).unwrap().status,
        PushStatus::Finished { .. }
    ));
}

/// S7 — a stream that raises mid-transfer is recorded as Failed with the
/// raised cause.
#[tokio::test]
async fn failure_during_streaming_is_recorded_with_cause() {
    let sink = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new().with_script(
        "Q",
        ScriptedBehavior::FailMidStream(ExecutionError::new(ErrorKind::Evaluator, "boom")),
    );
    let tables = FixtureTableStore::new().with_table(TableId(42), foo_table());
    let destinations =
        FixtureDestinationStore::new().with_destination(DestinationId(43), csv_destination("fs", sink));
    let controller = controller(evaluator, tables, destinations);

    controller
        .start(TableId(42), DestinationId(43), spec_for("/foo/bar"))
        .await;

    tokio::time::sleep(Duration::from_millis(30)).await;
    let status = controller.destination_status(DestinationId(43)).await.unwrap();
    match &status.get(&TableId(42)).unwrap().status {
        PushStatus::Failed { cause, .. } => assert_eq!(cause.message, "boom"),
        other => panic!("expected Failed, got {other:?}"),
    }
}

/// P5 — a synchronous evaluator failure still produces an observable
/// record (admission happens before the pipeline is polled).
#[tokio::test]
async fn synchronous_evaluator_failure_is_observable() {
    let sink = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new()
        .with_script("Q", ScriptedBehavior::FailSync(ExecutionError::new(ErrorKind::Evaluator, "bad query")));
    let tables = FixtureTableStore::new().with_table(TableId(42), foo_table());
    let destinations =
        FixtureDestinationStore::new().with_destination(DestinationId(43), csv_destination("fs", sink));
    let controller = controller(evaluator, tables, destinations);

    let outcome = controller
        .start(TableId(42), DestinationId(43), spec_for("/foo/bar"))
        .await;
    assert_eq!(outcome, Condition::Normal);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let status = controller.destination_status(DestinationId(43)).await.unwrap();
    match &status.get(&TableId(42)).unwrap().status {
        PushStatus::Failed { cause, .. } => assert_eq!(cause.message, "bad query"),
        other => panic!("expected Failed, got {other:?}"),
    }
}

/// P6 — cancelling a push that is not running is a no-op that still
/// returns Normal.
#[tokio::test]
async fn cancel_of_unstarted_push_is_idempotent_no_op() {
    let sink = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new();
    let tables = FixtureTableStore::new().with_table(TableId(42), foo_table());
    let destinations =
        FixtureDestinationStore::new().with_destination(DestinationId(43), csv_destination("fs", sink));
    let controller = controller(evaluator, tables, destinations);

    let result = controller.cancel(TableId(42), DestinationId(43)).await;
    assert_eq!(result, Condition::Normal);

    let status = controller.destination_status(DestinationId(43)).await.unwrap();
    assert!(status.is_empty());
}

/// cancel_all reaches every currently running push across destinations.
#[tokio::test]
async fn cancel_all_stops_every_running_push() {
    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new()
        .with_script("Q", ScriptedBehavior::EmitThenBlock(vec![Row(vec![CellValue::Text("x".into())])]));
    let tables = FixtureTableStore::new().with_table(TableId(42), foo_table());
    let destinations = FixtureDestinationStore::new()
        .with_destination(DestinationId(43), csv_destination("fs", sink_a))
        .with_destination(DestinationId(44), csv_destination("fs", sink_b));
    let controller = controller(evaluator, tables, destinations);

    controller.start(TableId(42), DestinationId(43), spec_for("/a")).await;
    controller.start(TableId(42), DestinationId(44), spec_for("/b")).await;

    tokio::time::sleep(Duration::from_millis(30)).await;
    controller.cancel_all().await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    for destination in [DestinationId(43), DestinationId(44)] {
        let status = controller.destination_status(destination).await.unwrap();
        assert!(matches!(
            status.get(&TableId(42)).unwrap().status,
            PushStatus::Canceled { .. }
        ));
    }
}

/// cancel_many attempts every id even when some can't be resolved, and
/// reports only the unresolved ones.
#[tokio::test]
async fn cancel_many_reports_unresolved_ids_and_cancels_the_rest() {
    let sink = RecordingSink::new();
    let evaluator = ScriptedEvaluator::new()
        .with_script("Q", ScriptedBehavior::EmitThenBlock(vec![Row(vec![CellValue::Text("x".into())])]));
    let tables = FixtureTableStore::new().with_table(TableId(42), foo_table());
    let destinations =
        FixtureDestinationStore::new().with_destination(DestinationId(43), csv_destination("fs", sink));
    let controller = controller(evaluator, tables, destinations);

    controller
        .start(TableId(42), DestinationId(43), spec_for("/foo/bar"))
        .await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let failures = controller
        .cancel_many(DestinationId(43), vec![TableId(42), TableId(7)])
        .await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures.get(&TableId(7)), Some(&PushError::TableNotFound(TableId(7))));

    tokio::time::sleep(Duration::from_millis(30)).await;
    let status = controller.destination_status(DestinationId(43)).await.unwrap();
    assert!(matches!(
        status.get(&TableId(42)).unwrap().status,
        PushStatus::Canceled { .. }
    ));
}

/// destination_status on an unregistered destination is an error.
#[tokio::test]
async fn destination_status_of_unknown_destination_errors() {
    let evaluator = ScriptedEvaluator::new();
    let tables = FixtureTableStore::new();
    let destinations = FixtureDestinationStore::new();
    let controller = controller(evaluator, tables, destinations);

    let result = controller.destination_status(DestinationId(1)).await;
    assert_eq!(result, Err(PushError::DestinationNotFound(DestinationId(1))));
}
