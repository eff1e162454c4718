//! Thin CLI wiring for manual, end-to-end smoke-testing of the push
//! lifecycle against an in-memory fixture catalog. Carries no part of the
//! `PushController` contract itself.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use rpush_engine::testing::{FixtureDestinationStore, FixtureTableStore};
use rpush_engine::{
    ByteStream, Evaluator, JobManager, PipelineBuilder, PushController,
};
use rpush_registry::{PushRegistry, StatusRecorder};
use rpush_types::{
    CellValue, ColumnMeta, ColumnType, Condition, Destination, DestinationId, DestinationTypeId,
    ErrorKind, ExecutionError, PushSpec, ResourcePath, ResultType, Row, RowStream, Sink, TableId,
    TableRef,
};

#[derive(Parser)]
#[command(name = "rpush-cli", about = "Exercise the result-push orchestrator from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a push and block until it reaches a terminal status.
    Start {
        #[arg(long)]
        table: u64,
        #[arg(long)]
        destination: u64,
        #[arg(long, default_value = "csv")]
        format: String,
        #[arg(long)]
        path: String,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Request cancellation of a push.
    Cancel {
        #[arg(long)]
        table: u64,
        #[arg(long)]
        destination: u64,
    },
    /// Print the known records for a destination.
    Status {
        #[arg(long)]
        destination: u64,
    },
}

/// Emits three rows derived from the table's query text, with a pause
/// between each so `cancel` has something to interrupt.
struct DemoEvaluator;

#[async_trait]
impl Evaluator for DemoEvaluator {
    async fn evaluate(&self, query: &str) -> Result<RowStream, ExecutionError> {
        let query = query.to_string();
        let stream = futures_util::stream::iter(0..3).then(move |i| {
            let query = query.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<Row, ExecutionError>(Row(vec![CellValue::Text(format!("{query}#{i}"))]))
            }
        });
        Ok(Box::pin(stream))
    }
}

/// Writes the pushed bytes to a file under `base_dir`.
struct FileSink {
    base_dir: PathBuf,
}

#[async_trait]
impl rpush_types::SinkConsumer for FileSink {
    async fn consume(
        &self,
        path: &ResourcePath,
        _columns: &[ColumnMeta],
        mut bytes: ByteStream,
    ) -> Result<(), ExecutionError> {
        use tokio::io::AsyncWriteExt;

        let full_path = self.base_dir.join(path.0.trim_start_matches('/'));
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ExecutionError::new(ErrorKind::Sink, "failed to create destination directory")
                    .with_detail(e.to_string())
            })?;
        }

        let mut file = tokio::fs::File::create(&full_path).await.map_err(|e| {
            ExecutionError::new(ErrorKind::Sink, "failed to create destination file")
                .with_detail(e.to_string())
        })?;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| {
                ExecutionError::new(ErrorKind::Sink, "failed to write destination file")
                    .with_detail(e.to_string())
            })?;
        }
        Ok(())
    }
}

/// Discards every byte it's handed; useful as a second format without a
/// second real destination.
struct NoopSink;

#[async_trait]
impl rpush_types::SinkConsumer for NoopSink {
    async fn consume(
        &self,
        _path: &ResourcePath,
        _columns: &[ColumnMeta],
        mut bytes: ByteStream,
    ) -> Result<(), ExecutionError> {
        while let Some(chunk) = bytes.next().await {
            chunk?;
        }
        Ok(())
    }
}

fn demo_tables() -> FixtureTableStore {
    FixtureTableStore::new()
        .with_table(
            TableId(1),
            TableRef {
                name: "orders".into(),
                query: "select * from orders".into(),
                columns: vec![ColumnMeta::new("row", ColumnType::Text)],
            },
        )
        .with_table(
            TableId(2),
            TableRef {
                name: "users".into(),
                query: "select * from users".into(),
                columns: vec![ColumnMeta::new("row", ColumnType::Text)],
            },
        )
}

fn demo_destinations(base_dir: PathBuf) -> FixtureDestinationStore {
    let destination = Destination::new(
        DestinationTypeId {
            name: "local-fs".into(),
            version: "1".into(),
        },
        vec![
            Sink {
                result_type: ResultType::Csv,
                consumer: Arc::new(FileSink { base_dir }),
            },
            Sink {
                result_type: ResultType::Json,
                consumer: Arc::new(NoopSink),
            },
        ],
    )
    .expect("demo destination always declares at least one sink");

    FixtureDestinationStore::new().with_destination(DestinationId(1), destination)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let registry = Arc::new(PushRegistry::default());
    let recorder = Arc::new(StatusRecorder::new(Arc::clone(&registry)));
    let jobs = Arc::new(JobManager::new(recorder));
    let pipeline = PipelineBuilder::new(Arc::new(DemoEvaluator));
    let base_dir = std::env::current_dir()?.join("rpush-out");

    let controller = PushController::new(
        Arc::new(demo_tables()),
        Arc::new(demo_destinations(base_dir)),
        registry,
        jobs,
        pipeline,
    );

    match cli.command {
        Command::Start {
            table,
            destination,
            format,
            path,
            limit,
        } => {
            let format = match format.to_lowercase().as_str() {
                "csv" => ResultType::Csv,
                "json" => ResultType::Json,
                other => anyhow::bail!("unsupported format {other:?}, expected csv or json"),
            };
            let spec = PushSpec {
                columns: vec![ColumnMeta::new("row", ColumnType::Text)],
                destination_path: ResourcePath(path),
                format,
                limit,
            };

            let table_id = TableId(table);
            let destination_id = DestinationId(destination);
            match controller.start(table_id, destination_id, spec).await {
                Condition::Abnormal(e) => {
                    println!("rejected: {e}");
                    return Ok(());
                }
                Condition::Normal => println!("started"),
            }

            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let records = controller.destination_status(destination_id).await?;
                if let Some(record) = records.get(&table_id) {
                    if record.status.is_terminal() {
                        println!("{}", record.status);
                        break;
                    }
                }
            }
        }
        Command::Cancel { table, destination } => {
            controller
                .cancel(TableId(table), DestinationId(destination))
                .await;
            println!("cancel requested");
        }
        Command::Status { destination } => match controller.destination_status(DestinationId(destination)).await {
            Ok(records) => {
                for (table, record) in records {
                    println!("{table}: {}", record.status);
                }
            }
            Err(e) => println!("error: {e}"),
        },
    }

    Ok(())
}
