use crate::error::{AppError, Result};
use crate::models::telemetry::{
    FeatureVector, LabeledSample, RiskLevel, FEATURE_NAMES, TARGET_COLUMN,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Column name of the opaque row identifier in record input.
pub const ID_COLUMN: &str = "vehicle_id";

/// Batch of feature rows addressed by column name.
///
/// Cells are optional: `None` marks a missing reading that the imputer fills.
/// Column order is whatever the producer used; [`FeatureTable::select`]
/// realigns to a fitted schema by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

impl FeatureTable {
    /// Create an empty table with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table with the canonical feature columns
    pub fn from_vectors(vectors: &[FeatureVector]) -> Self {
        let mut table = Self::new(FEATURE_NAMES.iter().map(|s| s.to_string()).collect());
        table.rows = vectors
            .iter()
            .map(|v| v.to_array().iter().map(|&x| Some(x)).collect())
            .collect();
        table
    }

    /// Build a table from JSON objects, one per row.
    ///
    /// Columns are taken from the keys of all records, minus `exclude`.
    /// Numbers and numeric strings become values, `null` or an absent key
    /// becomes a missing cell, anything else is rejected.
    pub fn from_records(records: &[Map<String, Value>], exclude: &[&str]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !exclude.contains(&key.as_str()) && !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut table = Self::new(columns);
        for (i, record) in records.iter().enumerate() {
            let row = table
                .columns
                .iter()
                .map(|col| parse_cell(record.get(col), col, i))
                .collect::<Result<Vec<_>>>()?;
            table.rows.push(row);
        }

        Ok(table)
    }

    /// Append a row; its length must match the column count
    pub fn push_row(&mut self, row: Vec<Option<f64>>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(AppError::Schema(format!(
                "row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, if present
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Keep only the named columns, in the given order
    pub fn project(&self, names: &[String]) -> Result<Self> {
        let positions = names
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| AppError::Schema(format!("missing feature column: {}", name)))
            })
            .collect::<Result<Vec<usize>>>()?;

        Ok(Self {
            columns: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| positions.iter().map(|&p| row[p]).collect())
                .collect(),
        })
    }

    /// Realign to `schema` and produce a dense matrix.
    ///
    /// The table must contain exactly the schema's columns (any order).
    /// Missing cells become NaN for the imputer; infinite values are rejected.
    pub fn select(&self, schema: &[String]) -> Result<Array2<f64>> {
        let missing: Vec<&str> = schema
            .iter()
            .filter(|name| !self.columns.contains(name))
            .map(|s| s.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Schema(format!(
                "missing feature columns: {}",
                missing.join(", ")
            )));
        }

        let extra: Vec<&str> = self
            .columns
            .iter()
            .filter(|name| !schema.contains(name))
            .map(|s| s.as_str())
            .collect();
        if !extra.is_empty() {
            return Err(AppError::Schema(format!(
                "unexpected feature columns: {}",
                extra.join(", ")
            )));
        }

        if self.columns.len() != schema.len() {
            return Err(AppError::Schema("duplicate feature columns".to_string()));
        }

        let positions: Vec<usize> = schema
            .iter()
            .filter_map(|name| self.columns.iter().position(|c| c == name))
            .collect();

        let mut matrix = Array2::from_elem((self.rows.len(), schema.len()), f64::NAN);
        for (i, row) in self.rows.iter().enumerate() {
            for (j, &src) in positions.iter().enumerate() {
                if let Some(value) = row[src] {
                    if value.is_infinite() {
                        return Err(AppError::Schema(format!(
                            "non-finite value in column {} at row {}",
                            schema[j], i
                        )));
                    }
                    matrix[[i, j]] = value;
                }
            }
        }

        Ok(matrix)
    }
}

fn parse_cell(value: Option<&Value>, column: &str, row: usize) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            AppError::Schema(format!(
                "non-numeric value {:?} in column {} at row {}",
                s, column, row
            ))
        }),
        Some(other) => Err(AppError::Schema(format!(
            "non-numeric value {} in column {} at row {}",
            other, column, row
        ))),
    }
}

/// Labeled training table: features, identifiers and a named label column
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    /// Opaque row identifiers (not used in training)
    pub ids: Vec<String>,

    /// Feature columns
    pub features: FeatureTable,

    /// Name of the label column
    pub target: String,

    /// Raw label values, one per row
    pub labels: Vec<String>,
}

impl TrainingSet {
    /// Build from typed samples; the label column is `failure_risk`
    pub fn from_samples(samples: &[LabeledSample]) -> Self {
        let vectors: Vec<FeatureVector> = samples.iter().map(|s| s.features).collect();
        Self {
            ids: samples.iter().map(|s| s.vehicle_id.clone()).collect(),
            features: FeatureTable::from_vectors(&vectors),
            target: TARGET_COLUMN.to_string(),
            labels: samples.iter().map(|s| s.failure_risk.to_string()).collect(),
        }
    }

    /// Build from JSON records carrying an id, a label column and features
    pub fn from_records(records: &[Map<String, Value>], target: &str) -> Result<Self> {
        let labels = records
            .iter()
            .enumerate()
            .map(|(i, r)| match r.get(target) {
                Some(Value::String(s)) => RiskLevel::from_str(s)
                    .map(|level| level.to_string())
                    .map_err(|_| {
                        AppError::Schema(format!(
                            "unknown risk label {:?} in column {} at row {}",
                            s, target, i
                        ))
                    }),
                Some(other) if !other.is_null() => Err(AppError::Schema(format!(
                    "label column {} at row {} must be a string, got {}",
                    target, i, other
                ))),
                _ => Err(AppError::Schema(format!(
                    "missing label column {} at row {}",
                    target, i
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let ids = records
            .iter()
            .enumerate()
            .map(|(i, r)| match r.get(ID_COLUMN) {
                Some(Value::String(s)) => s.clone(),
                _ => format!("row-{}", i),
            })
            .collect();

        Ok(Self {
            ids,
            features: FeatureTable::from_records(records, &[ID_COLUMN, target])?,
            target: target.to_string(),
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
