// src/lib.rs
//
// Crate root — public re-exports for the mlwatch telemetry engine.
//
// mlwatch ingests batches of feature, prediction, and ground-truth data
// produced during training or inference and incrementally computes a
// bounded, mergeable set of statistics that are flushed into a windowed
// wire-format message for upload to a monitoring backend.

pub mod error;
pub mod values;
pub mod schema;
pub mod sketch;
pub mod wire;
pub mod store;
pub mod metrics;
pub mod session;
pub mod upload;

pub use error::{Result, TelemetryError};
pub use values::{truncate_string, truncate_strings, Value};
pub use schema::{column_kind, normalize, Batch, ColumnKind};
pub use sketch::{QuantileSketch, SKETCH_IMPL};
pub use wire::{DataSource, DataStream, Metric, MetricType, Window};
pub use store::{class_hash, metric_key, MetricAccumulator, MetricStore};
pub use metrics::{
    update_data_metrics, update_performance_metrics, GroundTruthRecord, PredictionRecord,
};
pub use session::{Session, SessionOptions};
pub use upload::Uploader;
