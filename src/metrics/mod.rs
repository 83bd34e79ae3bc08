// src/metrics/mod.rs

//! Metric computation passes over ingested records: data-quality metrics for
//! feature/prediction columns and performance metrics for ground truth.

pub mod data;
pub mod perf;

pub use data::{update_data_metrics, PredictionRecord};
pub use perf::{update_performance_metrics, GroundTruthRecord};
