// src/metrics/data.rs
//
// Data-quality metrics over ingested feature and prediction columns.
// Batches are normalized first, so a shape mismatch fails the whole call
// before any accumulator is touched.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::schema::{self, Batch, ColumnKind};
use crate::store::{dims, MetricStore};
use crate::values::{truncate_string, Value};
use crate::wire::{DataSource, MetricType, Window};

/// One inference or training step's worth of data: a features column-set
/// plus prediction rows (one row per instance). Consumed, never mutated.
#[derive(Debug, Clone, Default)]
pub struct PredictionRecord {
    pub features: Option<Batch>,
    /// Row-major prediction output: one or more prediction columns per row.
    pub predictions: Option<Vec<Vec<Value>>>,
}

impl PredictionRecord {
    /// Instances this record contributes, for flush sizing.
    pub fn estimate_size(&self) -> usize {
        let features = self.features.as_ref().map(Batch::estimate_size).unwrap_or(0);
        let predictions = self.predictions.as_ref().map(Vec::len).unwrap_or(0);
        features.max(predictions)
    }
}

/// Compute data metrics for a batch of prediction records into the FEATURES
/// and PREDICTIONS streams. Repeated calls accumulate into the same window's
/// store; RATIO totals grow with every instance seen.
pub fn update_data_metrics(
    store: &mut MetricStore,
    window: &mut Window,
    records: &[PredictionRecord],
) -> Result<()> {
    let feature_batches: Vec<&Batch> =
        records.iter().filter_map(|r| r.features.as_ref()).collect();
    let prediction_batches: Vec<Batch> = records
        .iter()
        .filter_map(|r| r.predictions.as_ref())
        .map(|rows| Batch::Rows(rows.clone()))
        .collect();

    // Normalize everything up front: either the whole record set's
    // contribution is applied, or none of it.
    let features = schema::normalize(&feature_batches, None)?;
    let predictions = schema::normalize(&prediction_batches, None)?;

    window.stream_mut(DataSource::Features);
    window.stream_mut(DataSource::Predictions);

    update_stream(store, DataSource::Features, "feature", features)?;
    update_stream(store, DataSource::Predictions, "output", predictions)?;
    Ok(())
}

fn update_stream(
    store: &mut MetricStore,
    source: DataSource,
    dim_name: &str,
    (columns, data): (Vec<String>, Vec<Vec<Value>>),
) -> Result<()> {
    if columns.is_empty() {
        return Ok(());
    }

    let instance_count = data.first().map(Vec::len).unwrap_or(0);
    let no_dims = BTreeMap::new();
    store
        .get_or_create(source, "instance_count", &no_dims, MetricType::Counter)?
        .add(instance_count as f64);
    store
        .get_or_create(source, "column_count", &no_dims, MetricType::Gauge)?
        .set(columns.len() as f64);

    for (name, values) in columns.iter().zip(&data) {
        update_column(store, source, dim_name, name, values)?;
    }
    Ok(())
}

/// Emit the per-column ratio set for the column's materialized kind, plus
/// the distribution sketch over the numeric projection.
fn update_column(
    store: &mut MetricStore,
    source: DataSource,
    dim_name: &str,
    column: &str,
    values: &[Value],
) -> Result<()> {
    let column = truncate_string(column);
    let d = dims(&[(dim_name, column.as_str())]);
    let total = values.len() as f64;
    let kind = schema::column_kind(values);

    let ratio = |store: &mut MetricStore, name: &str, matched: usize| -> Result<()> {
        store
            .get_or_create(source, name, &d, MetricType::Ratio)?
            .update_ratio(matched as f64, total);
        Ok(())
    };

    let missing = values.iter().filter(|v| v.is_missing()).count();
    ratio(store, "missing_values", missing)?;

    match kind {
        ColumnKind::Integer | ColumnKind::Float => {
            let zero = values.iter().filter(|v| v.is_zero()).count();
            let integer = values.iter().filter(|v| v.is_integral()).count();
            let float = values.iter().filter(|v| v.is_fractional()).count();
            ratio(store, "zero_values", zero)?;
            ratio(store, "integer_values", integer)?;
            ratio(store, "float_values", float)?;
        }
        ColumnKind::Text => {
            let text = values.iter().filter(|v| v.is_text()).count();
            let empty = values.iter().filter(|v| v.is_empty_text()).count();
            ratio(store, "string_values", text)?;
            ratio(store, "empty_values", empty)?;
        }
        ColumnKind::Boolean => {
            let boolean = values.iter().filter(|v| v.is_boolean()).count();
            ratio(store, "boolean_values", boolean)?;
        }
    }

    let sketch = store.get_or_create(source, "distribution", &d, MetricType::Distribution)?;
    for value in values {
        if let Some(x) = value.numeric_projection() {
            sketch.observe(x);
        }
    }
    Ok(())
}
