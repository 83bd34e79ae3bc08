// src/wire.rs
//
// Windowed wire-format messages uploaded to the monitoring backend.
// Maps are BTreeMaps so a finalized window serializes byte-stably across
// processes and runs.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Logical source a data stream is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    Features,
    Predictions,
    GroundTruthBinary,
    GroundTruthCategorical,
    GroundTruthNumeric,
    UserDefined,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Features => "FEATURES",
            DataSource::Predictions => "PREDICTIONS",
            DataSource::GroundTruthBinary => "GROUND_TRUTH_BINARY",
            DataSource::GroundTruthCategorical => "GROUND_TRUTH_CATEGORICAL",
            DataSource::GroundTruthNumeric => "GROUND_TRUTH_NUMERIC",
            DataSource::UserDefined => "USER_DEFINED",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Counter,
    Gauge,
    Ratio,
    Distribution,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CounterValue {
    pub counter: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GaugeValue {
    pub gauge: f64,
}

/// Counter over total. A ratio with no matches serializes without the
/// `counter` field but always carries `total`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RatioValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<f64>,
    pub total: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistributionValue {
    /// Sketch implementation tag, e.g. "KLL200".
    pub sketch_impl: String,
    /// Opaque serialized sketch; decoded per `sketch_impl` downstream.
    pub sketch_payload: Bytes,
}

/// One metric: a name, a dimension mapping, and exactly one value shape.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_value: Option<CounterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gauge_value: Option<GaugeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio_value: Option<RatioValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_value: Option<DistributionValue>,
}

/// Metrics bucket for one data source, keyed by MetricKey.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DataStream {
    pub metrics: BTreeMap<String, Metric>,
}

/// One reporting interval's full set of accumulated metrics.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub data_streams: BTreeMap<String, DataStream>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data stream for `source`, created lazily on first write.
    pub fn stream_mut(&mut self, source: DataSource) -> &mut DataStream {
        self.data_streams
            .entry(source.as_str().to_string())
            .or_default()
    }

    pub fn stream(&self, source: DataSource) -> Option<&DataStream> {
        self.data_streams.get(source.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.data_streams.values().all(|s| s.metrics.is_empty())
    }

    /// Serialized wire form. Byte-stable for a given accumulated state.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
