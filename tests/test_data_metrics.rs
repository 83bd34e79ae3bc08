//! Integration tests for the data-quality metrics pass: feature and
//! prediction columns in, FEATURES/PREDICTIONS streams out.

use mlwatch::{
    metric_key, update_data_metrics, Batch, DataSource, Metric, MetricStore, MetricType,
    PredictionRecord, Value, Window, SKETCH_IMPL,
};

use std::collections::BTreeMap;

fn dims(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn metric<'a>(
    window: &'a Window,
    source: DataSource,
    name: &str,
    dims: &BTreeMap<String, String>,
) -> &'a Metric {
    let key = metric_key(name, dims);
    window
        .stream(source)
        .unwrap_or_else(|| panic!("no {} stream", source))
        .metrics
        .get(&key)
        .unwrap_or_else(|| panic!("no metric {} {:?} in {}", name, dims, source))
}

fn assert_ratio(
    window: &Window,
    source: DataSource,
    name: &str,
    d: &BTreeMap<String, String>,
    counter: Option<f64>,
    total: f64,
) {
    let m = metric(window, source, name, d);
    assert_eq!(m.metric_type, MetricType::Ratio, "{}", name);
    let ratio = m.ratio_value.as_ref().unwrap();
    assert_eq!(ratio.counter, counter, "{} {:?} counter", name, d);
    assert_eq!(ratio.total, total, "{} {:?} total", name, d);
}

fn sample_record() -> PredictionRecord {
    let features = Batch::Named(vec![
        ("f1".into(), vec![1i64.into(), 1i64.into(), 2i64.into(), 0i64.into()]),
        ("f2".into(), vec![3.5.into(), 4.5.into(), 5.5.into(), 0.0.into()]),
        ("f3".into(), vec!["a".into(), "b".into(), "c".into(), "c".into()]),
        (
            "f4".into(),
            vec![0.0.into(), f64::NAN.into(), f64::INFINITY.into(), 2.0.into()],
        ),
        (
            "f5".into(),
            vec![true.into(), true.into(), false.into(), Value::Null],
        ),
    ]);
    let predictions = vec![
        vec![0.1.into()],
        vec![0.2.into()],
        vec![0.1.into()],
        vec![0.4.into()],
    ];
    PredictionRecord {
        features: Some(features),
        predictions: Some(predictions),
    }
}

#[test]
fn empty_record_set_produces_empty_streams() {
    let mut store = MetricStore::new();
    let mut window = Window::new();
    update_data_metrics(&mut store, &mut window, &[]).unwrap();
    store.finalize_into(&mut window).unwrap();

    assert_eq!(window.stream(DataSource::Features).unwrap().metrics.len(), 0);
    assert_eq!(
        window.stream(DataSource::Predictions).unwrap().metrics.len(),
        0
    );
}

#[test]
fn feature_and_prediction_streams() {
    let mut store = MetricStore::new();
    let mut window = Window::new();

    update_data_metrics(&mut store, &mut window, &[sample_record()]).unwrap();
    store.finalize_into(&mut window).unwrap();

    let f = DataSource::Features;

    // f1: integer column.
    let f1 = dims(&[("feature", "f1")]);
    assert_ratio(&window, f, "missing_values", &f1, None, 4.0);
    assert_ratio(&window, f, "zero_values", &f1, Some(1.0), 4.0);
    assert_ratio(&window, f, "integer_values", &f1, Some(4.0), 4.0);
    assert_ratio(&window, f, "float_values", &f1, None, 4.0);

    // f2: float column, one integral zero.
    let f2 = dims(&[("feature", "f2")]);
    assert_ratio(&window, f, "missing_values", &f2, None, 4.0);
    assert_ratio(&window, f, "zero_values", &f2, Some(1.0), 4.0);
    assert_ratio(&window, f, "integer_values", &f2, Some(1.0), 4.0);
    assert_ratio(&window, f, "float_values", &f2, Some(3.0), 4.0);

    // f3: text column gets the textual metric set, no numeric ratios.
    let f3 = dims(&[("feature", "f3")]);
    assert_ratio(&window, f, "missing_values", &f3, None, 4.0);
    assert_ratio(&window, f, "string_values", &f3, Some(4.0), 4.0);
    assert_ratio(&window, f, "empty_values", &f3, None, 4.0);
    let zero_key = metric_key("zero_values", &f3);
    assert!(!window.stream(f).unwrap().metrics.contains_key(&zero_key));

    // f4: NaN and Infinity both count as missing, never as integer or float.
    let f4 = dims(&[("feature", "f4")]);
    assert_ratio(&window, f, "missing_values", &f4, Some(2.0), 4.0);
    assert_ratio(&window, f, "zero_values", &f4, Some(1.0), 4.0);
    assert_ratio(&window, f, "integer_values", &f4, Some(2.0), 4.0);
    assert_ratio(&window, f, "float_values", &f4, None, 4.0);

    // f5: boolean column; null counts as missing, never as boolean.
    let f5 = dims(&[("feature", "f5")]);
    assert_ratio(&window, f, "missing_values", &f5, Some(1.0), 4.0);
    assert_ratio(&window, f, "boolean_values", &f5, Some(3.0), 4.0);

    // Every feature column carries a distribution sketch, text included.
    for feature in ["f1", "f2", "f3", "f4", "f5"] {
        let d = dims(&[("feature", feature)]);
        let m = metric(&window, f, "distribution", &d);
        assert_eq!(m.metric_type, MetricType::Distribution);
        let dist = m.distribution_value.as_ref().unwrap();
        assert_eq!(dist.sketch_impl, SKETCH_IMPL);
        assert!(!dist.sketch_payload.is_empty());
    }

    // Stream-global metrics.
    let no_dims = BTreeMap::new();
    let instances = metric(&window, f, "instance_count", &no_dims);
    assert_eq!(instances.counter_value.as_ref().unwrap().counter, 4.0);
    let columns = metric(&window, f, "column_count", &no_dims);
    assert_eq!(columns.gauge_value.as_ref().unwrap().gauge, 5.0);

    // PREDICTIONS: single float output column, positional dimension.
    let p = DataSource::Predictions;
    let out = dims(&[("output", "0")]);
    assert_ratio(&window, p, "missing_values", &out, None, 4.0);
    assert_ratio(&window, p, "zero_values", &out, None, 4.0);
    assert_ratio(&window, p, "integer_values", &out, None, 4.0);
    assert_ratio(&window, p, "float_values", &out, Some(4.0), 4.0);
    let instances = metric(&window, p, "instance_count", &no_dims);
    assert_eq!(instances.counter_value.as_ref().unwrap().counter, 4.0);
    let columns = metric(&window, p, "column_count", &no_dims);
    assert_eq!(columns.gauge_value.as_ref().unwrap().gauge, 1.0);
}

#[test]
fn multiple_calls_accumulate_into_one_window() {
    let mut store = MetricStore::new();
    let mut window = Window::new();

    update_data_metrics(&mut store, &mut window, &[sample_record()]).unwrap();
    update_data_metrics(&mut store, &mut window, &[sample_record(), sample_record()]).unwrap();
    store.finalize_into(&mut window).unwrap();

    let f = DataSource::Features;
    let f1 = dims(&[("feature", "f1")]);
    assert_ratio(&window, f, "integer_values", &f1, Some(12.0), 12.0);
    assert_ratio(&window, f, "zero_values", &f1, Some(3.0), 12.0);

    let no_dims = BTreeMap::new();
    let instances = metric(&window, f, "instance_count", &no_dims);
    assert_eq!(instances.counter_value.as_ref().unwrap().counter, 12.0);
    // Gauge: latest value, not a sum.
    let columns = metric(&window, f, "column_count", &no_dims);
    assert_eq!(columns.gauge_value.as_ref().unwrap().gauge, 5.0);
}

#[test]
fn shape_mismatch_fails_without_partial_mutation() {
    let mut store = MetricStore::new();
    let mut window = Window::new();

    let good = PredictionRecord {
        features: Some(Batch::Named(vec![("f1".into(), vec![1i64.into()])])),
        predictions: None,
    };
    let bad = PredictionRecord {
        features: Some(Batch::Named(vec![
            ("f1".into(), vec![1i64.into()]),
            ("f2".into(), vec![2i64.into()]),
        ])),
        predictions: None,
    };

    assert!(update_data_metrics(&mut store, &mut window, &[good, bad]).is_err());
    store.finalize_into(&mut window).unwrap();
    // The failed call must not have contributed anything.
    assert!(window.is_empty());
}

#[test]
fn long_column_names_are_truncated_in_dimensions() {
    let mut store = MetricStore::new();
    let mut window = Window::new();

    let name = "1234567890abcdefghi"; // 19 chars
    let record = PredictionRecord {
        features: Some(Batch::Named(vec![(
            name.into(),
            vec![1i64.into(), 2i64.into()],
        )])),
        predictions: None,
    };
    update_data_metrics(&mut store, &mut window, &[record]).unwrap();
    store.finalize_into(&mut window).unwrap();

    let truncated = dims(&[("feature", "1234567890...efghi")]);
    assert_ratio(
        &window,
        DataSource::Features,
        "missing_values",
        &truncated,
        None,
        2.0,
    );
}

#[test]
fn finalized_window_is_byte_stable_across_runs() {
    let build = || {
        let mut store = MetricStore::new();
        let mut window = Window::new();
        update_data_metrics(&mut store, &mut window, &[sample_record()]).unwrap();
        store.finalize_into(&mut window).unwrap();
        window.to_bytes().unwrap()
    };
    assert_eq!(build(), build());
}
