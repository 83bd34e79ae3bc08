// src/metrics/perf.rs
//
// Performance metrics from ground-truth/prediction pairs, with per-segment
// and per-class breakdowns. Records dispatch by label/prediction kind into
// the binary, categorical, or numeric ground-truth stream; mixed batches are
// partitioned per record.

use std::collections::BTreeMap;

use log::warn;

use crate::error::Result;
use crate::store::{class_hash, dims, MetricStore};
use crate::values::{truncate_string, Value};
use crate::wire::{DataSource, MetricType, Window};

/// A labeled outcome: ground-truth label, the model's prediction, and
/// zero-or-more free-form segment tags for sub-population metrics.
#[derive(Debug, Clone)]
pub struct GroundTruthRecord {
    pub label: Value,
    pub prediction: Value,
    pub segments: Vec<String>,
}

impl GroundTruthRecord {
    pub fn new(label: impl Into<Value>, prediction: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            prediction: prediction.into(),
            segments: Vec::new(),
        }
    }

    pub fn with_segments<S: Into<String>>(mut self, segments: impl IntoIterator<Item = S>) -> Self {
        self.segments = segments.into_iter().map(Into::into).collect();
        self
    }
}

/// Compute performance metrics for a batch of ground-truth records.
/// Records whose label/prediction kinds disagree (or are missing) cannot be
/// dispatched to any stream; they are skipped and the rest of the batch
/// proceeds.
///
/// The store is updated per record, so an `Err` return (a shape conflict on
/// a pre-populated store) aborts mid-batch and leaves the contributions of
/// earlier records in place. The metric names emitted here never conflict
/// with each other, so the error is unreachable on a store fed only through
/// this module and [`update_data_metrics`](super::update_data_metrics).
pub fn update_performance_metrics(
    store: &mut MetricStore,
    window: &mut Window,
    records: &[GroundTruthRecord],
) -> Result<()> {
    for record in records {
        match (&record.label, &record.prediction) {
            (Value::Bool(label), Value::Bool(prediction)) => {
                window.stream_mut(DataSource::GroundTruthBinary);
                update_binary(store, *label, *prediction, &record.segments)?;
            }
            (Value::Text(label), Value::Text(prediction)) => {
                window.stream_mut(DataSource::GroundTruthCategorical);
                update_categorical(store, label, prediction, &record.segments)?;
            }
            (label, prediction) if label.is_numeric() && prediction.is_numeric() => {
                let label = label.as_f64().unwrap_or(f64::NAN);
                let prediction = prediction.as_f64().unwrap_or(f64::NAN);
                window.stream_mut(DataSource::GroundTruthNumeric);
                update_numeric(store, label, prediction, &record.segments)?;
            }
            (label, prediction) => {
                warn!(
                    "skipping ground-truth record with unsupported label/prediction kinds: {:?}/{:?}",
                    label, prediction
                );
            }
        }
    }
    Ok(())
}

fn update_binary(
    store: &mut MetricStore,
    label: bool,
    prediction: bool,
    segments: &[String],
) -> Result<()> {
    let source = DataSource::GroundTruthBinary;
    let correct = label == prediction;
    update_accuracy(store, source, correct, segments)?;

    let cell = match (label, prediction) {
        (true, true) => "binary_true_positives",
        (false, true) => "binary_false_positives",
        (false, false) => "binary_true_negatives",
        (true, false) => "binary_false_negatives",
    };
    let no_dims = BTreeMap::new();
    store
        .get_or_create(source, cell, &no_dims, MetricType::Counter)?
        .add(1.0);
    Ok(())
}

fn update_categorical(
    store: &mut MetricStore,
    label: &str,
    prediction: &str,
    segments: &[String],
) -> Result<()> {
    let source = DataSource::GroundTruthCategorical;
    let correct = label == prediction;
    update_accuracy(store, source, correct, segments)?;

    // Class identity is an opaque short hash so dimension cardinality stays
    // bounded regardless of label vocabulary size.
    let label_dims = dims(&[("class", class_hash(&truncate_string(label)).as_str())]);
    let counter = |store: &mut MetricStore, name, d: &BTreeMap<String, String>| -> Result<()> {
        store
            .get_or_create(source, name, d, MetricType::Counter)?
            .add(1.0);
        Ok(())
    };

    counter(store, "class_total", &label_dims)?;
    if correct {
        counter(store, "class_true_positives", &label_dims)?;
    } else {
        counter(store, "class_false_negatives", &label_dims)?;
        let prediction_dims =
            dims(&[("class", class_hash(&truncate_string(prediction)).as_str())]);
        counter(store, "class_false_positives", &prediction_dims)?;
    }
    Ok(())
}

fn update_numeric(
    store: &mut MetricStore,
    label: f64,
    prediction: f64,
    segments: &[String],
) -> Result<()> {
    let source = DataSource::GroundTruthNumeric;
    let error = label - prediction;
    let no_dims = BTreeMap::new();

    // Sums and counts only; means are derived downstream as sum/n so that
    // accumulation across calls and processes is a pure sum-merge.
    let add = |store: &mut MetricStore, name, d: &BTreeMap<String, String>, x| -> Result<()> {
        store
            .get_or_create(source, name, d, MetricType::Counter)?
            .add(x);
        Ok(())
    };

    add(store, "mae_sum", &no_dims, error.abs())?;
    add(store, "mse_sum", &no_dims, error * error)?;
    add(store, "mse_n", &no_dims, 1.0)?;

    for segment in segments {
        let d = dims(&[("segment", truncate_string(segment).as_str())]);
        add(store, "segment_mae_sum", &d, error.abs())?;
        add(store, "segment_mse_sum", &d, error * error)?;
        add(store, "segment_mse_n", &d, 1.0)?;
    }
    Ok(())
}

/// Dimensionless `accuracy` plus `segment_accuracy` for every tag the record
/// carries; a record with N segments contributes to N segment accumulators.
fn update_accuracy(
    store: &mut MetricStore,
    source: DataSource,
    correct: bool,
    segments: &[String],
) -> Result<()> {
    let no_dims = BTreeMap::new();
    store
        .get_or_create(source, "accuracy", &no_dims, MetricType::Ratio)?
        .observe_ratio(correct);
    for segment in segments {
        let d = dims(&[("segment", truncate_string(segment).as_str())]);
        store
            .get_or_create(source, "segment_accuracy", &d, MetricType::Ratio)?
            .observe_ratio(correct);
    }
    Ok(())
}
