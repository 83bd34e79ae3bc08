// src/store.rs
//
// Metric identity and accumulation. A (name, dimensions) pair hashes to a
// stable short key; the store maps (data source, key) to a mutable
// accumulator that is finalized exactly once into the wire window.

use std::collections::{BTreeMap, HashMap};

use log::warn;
use sha2::{Digest, Sha256};

use crate::error::{Result, TelemetryError};
use crate::sketch::{QuantileSketch, SKETCH_IMPL};
use crate::wire::{
    CounterValue, DataSource, DistributionValue, GaugeValue, Metric, MetricType, RatioValue,
    Window,
};

/// Hex width of a MetricKey: 12 chars = 48 bits.
const METRIC_KEY_CHARS: usize = 12;

/// Hex width of a class-identity hash (bounds dimension cardinality).
const CLASS_HASH_CHARS: usize = 8;

/// Stable key for a (name, dimensions) pair: SHA-256 over the canonical
/// serialization (name, then dimension pairs sorted by key name), truncated
/// to 12 lowercase hex chars. Pure; identical across processes and runs.
pub fn metric_key(name: &str, dimensions: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    for (k, v) in dimensions {
        hasher.update([0x1f]);
        hasher.update(k.as_bytes());
        hasher.update([0x1f]);
        hasher.update(v.as_bytes());
    }
    hex_prefix(&hasher.finalize(), METRIC_KEY_CHARS)
}

/// Opaque short hash standing in for a raw class label, so per-class
/// dimensions stay bounded regardless of label vocabulary size.
pub fn class_hash(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex_prefix(&hasher.finalize(), CLASS_HASH_CHARS)
}

fn hex_prefix(digest: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(chars);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
        if out.len() >= chars {
            break;
        }
    }
    out.truncate(chars);
    out
}

#[derive(Debug)]
enum AccumulatorState {
    Counter {
        counter: f64,
    },
    Gauge {
        gauge: Option<f64>,
    },
    Ratio {
        counter: f64,
        total: f64,
    },
    Distribution {
        sketch: QuantileSketch,
        exported: Option<DistributionValue>,
    },
}

impl AccumulatorState {
    fn new(shape: MetricType) -> Self {
        match shape {
            MetricType::Counter => AccumulatorState::Counter { counter: 0.0 },
            MetricType::Gauge => AccumulatorState::Gauge { gauge: None },
            MetricType::Ratio => AccumulatorState::Ratio {
                counter: 0.0,
                total: 0.0,
            },
            MetricType::Distribution => AccumulatorState::Distribution {
                sketch: QuantileSketch::default(),
                exported: None,
            },
        }
    }

    fn shape(&self) -> MetricType {
        match self {
            AccumulatorState::Counter { .. } => MetricType::Counter,
            AccumulatorState::Gauge { .. } => MetricType::Gauge,
            AccumulatorState::Ratio { .. } => MetricType::Ratio,
            AccumulatorState::Distribution { .. } => MetricType::Distribution,
        }
    }
}

fn shape_name(shape: MetricType) -> &'static str {
    match shape {
        MetricType::Counter => "COUNTER",
        MetricType::Gauge => "GAUGE",
        MetricType::Ratio => "RATIO",
        MetricType::Distribution => "DISTRIBUTION",
    }
}

/// Per-key mutable state held across computer invocations within one window.
#[derive(Debug)]
pub struct MetricAccumulator {
    name: String,
    dimensions: BTreeMap<String, String>,
    state: AccumulatorState,
}

impl MetricAccumulator {
    fn new(name: &str, dimensions: &BTreeMap<String, String>, shape: MetricType) -> Self {
        Self {
            name: name.to_string(),
            dimensions: dimensions.clone(),
            state: AccumulatorState::new(shape),
        }
    }

    pub fn shape(&self) -> MetricType {
        self.state.shape()
    }

    /// COUNTER: sum in place.
    pub fn add(&mut self, x: f64) {
        match &mut self.state {
            AccumulatorState::Counter { counter } => *counter += x,
            _ => warn!("add() on non-counter metric '{}'", self.name),
        }
    }

    /// GAUGE: last value wins.
    pub fn set(&mut self, x: f64) {
        match &mut self.state {
            AccumulatorState::Gauge { gauge } => *gauge = Some(x),
            _ => warn!("set() on non-gauge metric '{}'", self.name),
        }
    }

    /// RATIO: always bumps `total`, bumps `counter` when matched.
    pub fn observe_ratio(&mut self, matched: bool) {
        self.update_ratio(if matched { 1.0 } else { 0.0 }, 1.0);
    }

    /// RATIO, batch form: add `matched` to the counter and `total` to the
    /// denominator in one call.
    pub fn update_ratio(&mut self, matched: f64, total_delta: f64) {
        match &mut self.state {
            AccumulatorState::Ratio { counter, total } => {
                *counter += matched;
                *total += total_delta;
            }
            _ => warn!("update_ratio() on non-ratio metric '{}'", self.name),
        }
    }

    /// DISTRIBUTION: feed one numeric observation into the sketch.
    pub fn observe(&mut self, x: f64) {
        match &mut self.state {
            AccumulatorState::Distribution { sketch, .. } => sketch.observe(x),
            _ => warn!("observe() on non-distribution metric '{}'", self.name),
        }
    }

    /// Fold another sketch into a distribution accumulator, for accumulation
    /// runs that were fed independently.
    pub fn merge_sketch(&mut self, other: &QuantileSketch) {
        match &mut self.state {
            AccumulatorState::Distribution { sketch, .. } => sketch.merge(other),
            _ => warn!("merge_sketch() on non-distribution metric '{}'", self.name),
        }
    }

    /// Idempotent and deterministic; for distributions this compacts the
    /// sketch into its exportable form once and caches it.
    pub fn finalize(&mut self) -> Result<()> {
        if let AccumulatorState::Distribution { sketch, exported } = &mut self.state {
            if exported.is_none() {
                *exported = Some(DistributionValue {
                    sketch_impl: SKETCH_IMPL.to_string(),
                    sketch_payload: sketch.to_payload()?,
                });
            }
        }
        Ok(())
    }

    /// Wire form of the current accumulated state.
    pub fn to_metric(&self) -> Result<Metric> {
        let mut metric = Metric {
            name: self.name.clone(),
            metric_type: self.state.shape(),
            dimensions: self.dimensions.clone(),
            counter_value: None,
            gauge_value: None,
            ratio_value: None,
            distribution_value: None,
        };
        match &self.state {
            AccumulatorState::Counter { counter } => {
                metric.counter_value = Some(CounterValue { counter: *counter });
            }
            AccumulatorState::Gauge { gauge } => {
                if let Some(gauge) = gauge {
                    metric.gauge_value = Some(GaugeValue { gauge: *gauge });
                }
            }
            AccumulatorState::Ratio { counter, total } => {
                metric.ratio_value = Some(RatioValue {
                    counter: (*counter != 0.0).then_some(*counter),
                    total: *total,
                });
            }
            AccumulatorState::Distribution { sketch, exported } => {
                metric.distribution_value = Some(match exported {
                    Some(v) => v.clone(),
                    // Not yet finalized; export from the live state.
                    None => DistributionValue {
                        sketch_impl: SKETCH_IMPL.to_string(),
                        sketch_payload: sketch.to_payload()?,
                    },
                });
            }
        }
        Ok(metric)
    }
}

/// Arena of accumulators for one window, keyed by (data source, MetricKey).
/// Explicitly passed into every computation call; no hidden global state.
#[derive(Debug, Default)]
pub struct MetricStore {
    accumulators: HashMap<(DataSource, String), MetricAccumulator>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator for (name, dimensions) in `source`, created bound to
    /// `shape` on first use. A shape conflict on an existing key is a caller
    /// defect and fails hard.
    pub fn get_or_create(
        &mut self,
        source: DataSource,
        name: &str,
        dimensions: &BTreeMap<String, String>,
        shape: MetricType,
    ) -> Result<&mut MetricAccumulator> {
        let key = metric_key(name, dimensions);
        let acc = self
            .accumulators
            .entry((source, key))
            .or_insert_with(|| MetricAccumulator::new(name, dimensions, shape));
        if acc.shape() != shape {
            return Err(TelemetryError::ShapeConflict {
                name: name.to_string(),
                existing: shape_name(acc.shape()),
                requested: shape_name(shape),
            });
        }
        Ok(acc)
    }

    /// Finalize every accumulator and commit it into `window`. Idempotent:
    /// repeated calls rewrite the same keys with the same values.
    pub fn finalize_into(&mut self, window: &mut Window) -> Result<()> {
        for ((source, key), acc) in &mut self.accumulators {
            acc.finalize()?;
            window
                .stream_mut(*source)
                .metrics
                .insert(key.clone(), acc.to_metric()?);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }

    pub fn clear(&mut self) {
        self.accumulators.clear();
    }
}

/// Dimension-map shorthand used by the metric computers.
pub fn dims(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
