//! Inference request normalization
//!
//! Reconciles a loosely-typed [`Record`] with the pipeline's
//! [`FeatureSchema`]:
//!
//! 1. required fields are checked (absent, null, empty, zero and `false`
//!    all count as missing)
//! 2. body-mass index is derived from height and weight when not supplied
//! 3. the record is reindexed onto the schema's columns and order
//! 4. numeric columns become floats, unparseable or absent values take the
//!    fill value; categorical columns become strings, absent values become
//!    the empty string
//!
//! When the schema could not be introspected, steps 3 and 4 are skipped and
//! the record goes to the pipeline as-is.

use crate::schema::FeatureKind;
use crate::{Cell, Error, FeatureSchema, Frame, Record, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Column names used to derive body-mass index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmiDerivation {
    pub bmi: String,
    pub height_cm: String,
    pub weight_kg: String,
}

impl Default for BmiDerivation {
    fn default() -> Self {
        Self {
            bmi: "bmi".to_string(),
            height_cm: "height_cm".to_string(),
            weight_kg: "weight_kg".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationPolicy {
    /// Fields that must be supplied, reported in this order when missing.
    pub required: Vec<String>,
    /// Value for numeric fields that are absent or unparseable.
    pub numeric_fill: f64,
    pub bmi: Option<BmiDerivation>,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self {
            required: ["gender", "age", "height_cm", "weight_kg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            numeric_fill: 0.0,
            bmi: Some(BmiDerivation::default()),
        }
    }
}

/// A record reindexed onto the schema, in schema column order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    entries: Vec<(String, Cell)>,
}

impl NormalizedRecord {
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.entries.into_iter().map(|(_, c)| c).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    schema: Option<FeatureSchema>,
    policy: NormalizationPolicy,
}

impl Normalizer {
    pub fn new(schema: Option<FeatureSchema>, policy: NormalizationPolicy) -> Self {
        Self { schema, policy }
    }

    pub fn schema(&self) -> Option<&FeatureSchema> {
        self.schema.as_ref()
    }

    pub fn policy(&self) -> &NormalizationPolicy {
        &self.policy
    }

    /// Fail with every required field the record lacks.
    pub fn validate(&self, record: &Record) -> Result<()> {
        let missing: Vec<String> = self
            .policy
            .required
            .iter()
            .filter(|name| !record.value(name).is_truthy())
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingRequiredFields(missing))
        }
    }

    /// Fill in body-mass index from height (cm) and weight (kg) when the
    /// record lacks it. Returns the derived value.
    pub fn derive_features(&self, record: &mut Record) -> Option<f64> {
        let cols = self.policy.bmi.as_ref()?;
        if let Some(schema) = &self.schema {
            if !schema.contains(&cols.bmi) {
                return None;
            }
        }
        if !record.value(&cols.bmi).is_missing() {
            return None;
        }

        let positive = |cell: &Cell| cell.to_f64().filter(|v| v.is_finite() && *v > 0.0);
        let height_m = positive(record.value(&cols.height_cm))? / 100.0;
        let weight = positive(record.value(&cols.weight_kg))?;

        let bmi = round2(weight / (height_m * height_m));
        record.insert(cols.bmi.clone(), Cell::Float(bmi));
        Some(bmi)
    }

    /// Reindex and coerce a record onto `schema`. Never fails.
    pub fn normalize(&self, record: &Record, schema: &FeatureSchema) -> NormalizedRecord {
        let entries = schema
            .columns()
            .iter()
            .zip(schema.kinds())
            .map(|(name, kind)| {
                let cell = record.value(name);
                let normalized = match kind {
                    FeatureKind::Numeric => match cell.to_f64().filter(|v| v.is_finite()) {
                        Some(v) => Cell::Float(v),
                        None => {
                            if !cell.is_missing() {
                                debug!(column = %name, value = ?cell, "numeric value unparseable, using fill value");
                            }
                            Cell::Float(self.policy.numeric_fill)
                        }
                    },
                    FeatureKind::Categorical => Cell::Text(cell.to_category().unwrap_or_default()),
                    FeatureKind::Passthrough => cell.clone(),
                };
                (name.clone(), normalized)
            })
            .collect();

        NormalizedRecord { entries }
    }

    /// Prepare every record and assemble a frame in input order. Any failing
    /// record fails the whole batch.
    pub fn prepare_frame(&self, records: Vec<Record>) -> Result<Frame> {
        let checked = records
            .into_par_iter()
            .enumerate()
            .map(|(i, record)| self.checked(record).map_err(|e| e.at_row(i)))
            .collect::<Result<Vec<_>>>()?;

        self.assemble(checked)
    }

    /// Single-record frame; errors are not wrapped with a row index.
    pub fn prepare_single(&self, record: Record) -> Result<Frame> {
        let record = self.checked(record)?;
        self.assemble(vec![record])
    }

    fn checked(&self, mut record: Record) -> Result<Record> {
        self.validate(&record)?;
        self.derive_features(&mut record);
        Ok(record)
    }

    fn assemble(&self, records: Vec<Record>) -> Result<Frame> {
        match &self.schema {
            Some(schema) => {
                let rows: Vec<Vec<Cell>> = records
                    .par_iter()
                    .map(|record| self.normalize(record, schema).into_cells())
                    .collect();
                let mut frame = Frame::new(schema.columns().to_vec());
                for row in rows {
                    frame.push_row(row)?;
                }
                Ok(frame)
            }
            None => Ok(Frame::from_records(&records)),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
