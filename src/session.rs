// src/session.rs
//
// Per-model accumulation front-end: buffers prediction and ground-truth
// records, drives the metric computers at flush time, and hands the
// finalized window to the upload path. One logical accumulation pass per
// window; callers needing concurrency shard by session.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error};

use crate::error::Result;
use crate::metrics::{
    update_data_metrics, update_performance_metrics, GroundTruthRecord, PredictionRecord,
};
use crate::store::MetricStore;
use crate::upload::Uploader;
use crate::values::Value;
use crate::wire::{DataSource, MetricType, Window};

/// Flush-policy and cap knobs. Builder helpers allow a fluent style:
///
/// ```ignore
/// let opts = SessionOptions::default()
///     .with_min_batch_size(100)
///     .with_min_interval(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Buffered instances required before an interval-based flush.
    pub min_batch_size: usize,
    /// Earliest time after the window opened that a flush may happen.
    pub min_interval: Duration,
    /// A flush happens after this long regardless of buffered size.
    pub max_interval: Duration,
    /// Cap on distinct user-defined metrics per window.
    pub max_user_metrics: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            min_batch_size: 50,
            min_interval: Duration::from_secs(120),
            max_interval: Duration::from_secs(600),
            max_user_metrics: 50,
        }
    }
}

impl SessionOptions {
    pub fn with_min_batch_size(mut self, n: usize) -> Self {
        self.min_batch_size = n;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_max_user_metrics(mut self, n: usize) -> Self {
        self.max_user_metrics = n;
        self
    }
}

/// Accumulation session for one model. Not internally synchronized.
pub struct Session {
    model_name: String,
    options: SessionOptions,
    store: MetricStore,
    prediction_buffer: Vec<PredictionRecord>,
    ground_truth_buffer: Vec<GroundTruthRecord>,
    user_metric_names: HashSet<String>,
    buffered_instances: usize,
    window_start: DateTime<Utc>,
}

impl Session {
    pub fn new(model_name: impl Into<String>, options: SessionOptions) -> Self {
        Self {
            model_name: model_name.into(),
            options,
            store: MetricStore::new(),
            prediction_buffer: Vec::new(),
            ground_truth_buffer: Vec::new(),
            user_metric_names: HashSet::new(),
            buffered_instances: 0,
            window_start: Utc::now(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Buffer one prediction record for the next flush.
    pub fn log_prediction(&mut self, record: PredictionRecord) {
        self.buffered_instances += record.estimate_size();
        self.prediction_buffer.push(record);
    }

    /// Buffer one ground-truth record for the next flush.
    pub fn log_ground_truth(
        &mut self,
        label: impl Into<Value>,
        prediction: impl Into<Value>,
        segments: Vec<String>,
    ) {
        self.ground_truth_buffer
            .push(GroundTruthRecord::new(label, prediction).with_segments(segments));
    }

    /// Record a user-defined gauge into the USER_DEFINED stream. The last
    /// logged value wins at flush. Calls past the distinct-name cap are
    /// dropped.
    pub fn log_metric(&mut self, name: &str, value: f64) -> Result<()> {
        if !self.user_metric_names.contains(name)
            && self.user_metric_names.len() >= self.options.max_user_metrics
        {
            error!(
                "too many user metrics, max={}; dropping '{}'",
                self.options.max_user_metrics, name
            );
            return Ok(());
        }
        self.user_metric_names.insert(name.to_string());
        self.store
            .get_or_create(
                DataSource::UserDefined,
                name,
                &BTreeMap::new(),
                MetricType::Gauge,
            )?
            .set(value);
        Ok(())
    }

    /// Whether the flush policy says the current window should be flushed:
    /// enough buffered instances once the minimum interval elapsed, or the
    /// maximum interval elapsed regardless of size.
    pub fn should_flush(&self, now: DateTime<Utc>) -> bool {
        let elapsed = (now - self.window_start)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if elapsed < self.options.min_interval {
            return false;
        }
        self.buffered_instances >= self.options.min_batch_size
            || elapsed >= self.options.max_interval
    }

    /// Drain the buffers through the metric computers, finalize every
    /// accumulator into a fresh window, and reset the session. Returns `None`
    /// when nothing was accumulated. A failed computation is dropped with an
    /// error log; the rest of the window still flushes and the buffers reset,
    /// so one bad batch cannot wedge the session.
    pub fn flush(&mut self) -> Result<Option<(Window, DateTime<Utc>)>> {
        if self.prediction_buffer.is_empty()
            && self.ground_truth_buffer.is_empty()
            && self.store.is_empty()
        {
            return Ok(None);
        }

        let mut window = Window::new();
        if let Err(e) = update_data_metrics(&mut self.store, &mut window, &self.prediction_buffer)
        {
            error!(
                "dropping data metrics for model '{}': {}",
                self.model_name, e
            );
        }
        if let Err(e) =
            update_performance_metrics(&mut self.store, &mut window, &self.ground_truth_buffer)
        {
            error!(
                "dropping performance metrics for model '{}': {}",
                self.model_name, e
            );
        }
        self.store.finalize_into(&mut window)?;

        let timestamp = Utc::now();
        debug!(
            "flushed window for model '{}': {} predictions, {} ground truths, {} metrics keys",
            self.model_name,
            self.prediction_buffer.len(),
            self.ground_truth_buffer.len(),
            self.store.len(),
        );

        self.prediction_buffer.clear();
        self.ground_truth_buffer.clear();
        self.user_metric_names.clear();
        self.store.clear();
        self.buffered_instances = 0;
        self.window_start = timestamp;

        if window.is_empty() {
            return Ok(None);
        }
        Ok(Some((window, timestamp)))
    }

    /// Flush and hand the window to the uploader. Upload failures propagate;
    /// the engine does not retry.
    pub async fn flush_to(&mut self, uploader: &dyn Uploader) -> anyhow::Result<bool> {
        match self.flush()? {
            Some((window, timestamp)) => {
                uploader.upload_window(&window, timestamp).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_flushes_to_none() {
        let mut session = Session::new("m1", SessionOptions::default());
        assert!(session.flush().unwrap().is_none());
    }

    #[test]
    fn flush_policy_respects_intervals_and_size() {
        let options = SessionOptions::default()
            .with_min_batch_size(2)
            .with_min_interval(Duration::ZERO)
            .with_max_interval(Duration::from_secs(600));
        let mut session = Session::new("m1", options);
        assert!(!session.should_flush(Utc::now()));

        session.log_prediction(PredictionRecord {
            features: Some(crate::schema::Batch::Named(vec![(
                "f1".into(),
                vec![Value::Int(1), Value::Int(2)],
            )])),
            predictions: None,
        });
        assert!(session.should_flush(Utc::now()));
    }

    #[test]
    fn user_metric_cap_drops_overflow() {
        let options = SessionOptions::default().with_max_user_metrics(2);
        let mut session = Session::new("m1", options);
        session.log_metric("a", 1.0).unwrap();
        session.log_metric("b", 2.0).unwrap();
        session.log_metric("c", 3.0).unwrap(); // dropped
        session.log_metric("a", 4.0).unwrap(); // update, not a new name

        let (window, _) = session.flush().unwrap().unwrap();
        let stream = window.stream(DataSource::UserDefined).unwrap();
        assert_eq!(stream.metrics.len(), 2);
        let names: Vec<&str> = stream.metrics.values().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"a") && names.contains(&"b"));
    }
}
