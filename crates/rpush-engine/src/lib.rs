//! The job manager, pipeline builder, external-collaborator traits, and
//! the `PushController` facade. The crate most application binaries
//! depend on; `rpush-types` and `rpush-registry` stay narrow on purpose
//! so this crate is where the concurrency and composition actually live.

pub mod collaborators;
pub mod controller;
pub mod job_manager;
pub mod pipeline;
pub mod render;
pub mod testing;

pub use collaborators::{DestinationStore, Evaluator, TableStore};
pub use controller::PushController;
pub use job_manager::JobManager;
pub use pipeline::PipelineBuilder;
pub use render::{render_csv, render_json, CsvRenderConfig, JsonRenderConfig};

pub use rpush_types::ByteStream;
