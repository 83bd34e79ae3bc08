// src/schema.rs
//
// Schema normalizer: unifies heterogeneous batch shapes (named columns,
// row-major records, labeled frames, numeric matrices) into typed columnar
// data for the metric computers.

use crate::error::{Result, TelemetryError};
use crate::values::Value;

/// One batch of feature or prediction data, in whichever shape the caller
/// produced it.
#[derive(Debug, Clone)]
pub enum Batch {
    /// Mapping from column name to that column's values, in declaration order.
    Named(Vec<(String, Vec<Value>)>),
    /// Row-major records: outer index is the instance, inner index the column.
    Rows(Vec<Vec<Value>>),
    /// Labeled tabular frame; `columns: None` falls back to positional names.
    Frame {
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Value>>,
    },
    /// Raw numeric matrix, always materialized as floating point.
    Matrix(Vec<Vec<f64>>),
}

impl Batch {
    /// Number of instances (rows) this batch contributes. For named batches
    /// the first present column's length is used; equal column lengths within
    /// one batch are assumed, not enforced.
    pub fn estimate_size(&self) -> usize {
        match self {
            Batch::Named(cols) => cols.first().map(|(_, v)| v.len()).unwrap_or(0),
            Batch::Rows(rows) => rows.len(),
            Batch::Frame { rows, .. } => rows.len(),
            Batch::Matrix(rows) => rows.len(),
        }
    }

    /// Column names this batch declares, if any.
    fn column_names(&self) -> Option<Vec<String>> {
        match self {
            Batch::Named(cols) => Some(cols.iter().map(|(n, _)| n.clone()).collect()),
            Batch::Frame {
                columns: Some(c), ..
            } => Some(c.clone()),
            _ => None,
        }
    }

    /// Column count, for positional batches and mismatch reporting.
    fn column_count(&self) -> usize {
        match self {
            Batch::Named(cols) => cols.len(),
            Batch::Rows(rows) => rows.first().map(|r| r.len()).unwrap_or(0),
            Batch::Frame { columns, rows } => columns
                .as_ref()
                .map(|c| c.len())
                .unwrap_or_else(|| rows.first().map(|r| r.len()).unwrap_or(0)),
            Batch::Matrix(rows) => rows.first().map(|r| r.len()).unwrap_or(0),
        }
    }
}

/// Materialized column type after promotion. A column holding only integral
/// integers stays `Integer`; any floating-point contribution promotes the
/// whole column to `Float`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

/// Classify a materialized column. Any text value makes the column textual;
/// otherwise any numeric value makes it numeric (promoted per value types);
/// otherwise booleans. An all-missing column classifies as `Float`.
pub fn column_kind(values: &[Value]) -> ColumnKind {
    let mut saw_bool = false;
    let mut saw_int = false;
    let mut saw_float = false;
    for v in values {
        match v {
            Value::Text(_) => return ColumnKind::Text,
            Value::Bool(_) => saw_bool = true,
            Value::Int(_) => saw_int = true,
            Value::Float(_) => saw_float = true,
            Value::Null => {}
        }
    }
    if saw_float {
        ColumnKind::Float
    } else if saw_int {
        ColumnKind::Integer
    } else if saw_bool {
        ColumnKind::Boolean
    } else {
        ColumnKind::Float
    }
}

/// Normalize an ordered list of batches into `(columns, data)` where `data`
/// holds one value array per column, aligned to `columns`.
///
/// Column-name resolution priority: the explicit `columns` argument, then the
/// first batch's own names, then stringified positional indices. Every
/// subsequent batch must align to that order by name (named batches) or by
/// position (unnamed ones).
pub fn normalize<B: std::borrow::Borrow<Batch>>(
    batches: &[B],
    columns: Option<&[String]>,
) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let Some(first) = batches.first() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let first = first.borrow();

    let names: Vec<String> = match columns {
        Some(explicit) => explicit.to_vec(),
        None => first
            .column_names()
            .unwrap_or_else(|| (0..first.column_count()).map(|i| i.to_string()).collect()),
    };

    let mut data: Vec<Vec<Value>> = vec![Vec::new(); names.len()];

    for batch in batches {
        match batch.borrow() {
            Batch::Named(cols) => {
                append_named(&names, cols, &mut data)?;
            }
            Batch::Frame {
                columns: Some(labels),
                rows,
            } => {
                let cols = frame_to_columns(labels, rows)?;
                append_named(&names, &cols, &mut data)?;
            }
            Batch::Frame { columns: None, rows } | Batch::Rows(rows) => {
                append_rows(&names, rows, &mut data)?;
            }
            Batch::Matrix(rows) => {
                for row in rows {
                    if row.len() != names.len() {
                        return Err(shape_mismatch(names.len(), row.len()));
                    }
                    for (j, x) in row.iter().enumerate() {
                        data[j].push(Value::Float(*x));
                    }
                }
            }
        }
    }

    Ok((names, data))
}

fn append_named(
    names: &[String],
    cols: &[(String, Vec<Value>)],
    data: &mut [Vec<Value>],
) -> Result<()> {
    if cols.len() != names.len() {
        return Err(shape_mismatch(names.len(), cols.len()));
    }
    for (j, name) in names.iter().enumerate() {
        let col = cols
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| TelemetryError::ShapeMismatch(format!("missing column '{}'", name)))?;
        data[j].extend(col.1.iter().cloned());
    }
    Ok(())
}

fn append_rows(names: &[String], rows: &[Vec<Value>], data: &mut [Vec<Value>]) -> Result<()> {
    for row in rows {
        if row.len() != names.len() {
            return Err(shape_mismatch(names.len(), row.len()));
        }
        for (j, v) in row.iter().enumerate() {
            data[j].push(v.clone());
        }
    }
    Ok(())
}

fn frame_to_columns(labels: &[String], rows: &[Vec<Value>]) -> Result<Vec<(String, Vec<Value>)>> {
    let mut cols: Vec<(String, Vec<Value>)> =
        labels.iter().map(|l| (l.clone(), Vec::new())).collect();
    for row in rows {
        if row.len() != labels.len() {
            return Err(shape_mismatch(labels.len(), row.len()));
        }
        for (j, v) in row.iter().enumerate() {
            cols[j].1.push(v.clone());
        }
    }
    Ok(cols)
}

fn shape_mismatch(expected: usize, got: usize) -> TelemetryError {
    TelemetryError::ShapeMismatch(format!("expected {} columns, got {}", expected, got))
}
