//! Column transformer
//!
//! Turns a frame row into the dense feature vector the forest was fitted on:
//! one-hot blocks for categorical columns followed by standard-scaled numeric
//! columns. Columns the transformer does not know are dropped.

use crate::{Cell, Error, Frame, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// One-hot encoded column. Unknown categories encode as all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotColumn {
    pub column: String,
    pub categories: Vec<String>,
}

/// Standard-scaled column: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledColumn {
    pub column: String,
    pub mean: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorArtifact {
    pub categorical: Vec<OneHotColumn>,
    pub numeric: Vec<ScaledColumn>,
}

#[derive(Debug, Clone)]
struct Encoder {
    column: String,
    positions: AHashMap<String, usize>,
}

#[derive(Debug, Clone)]
struct Scaler {
    column: String,
    offset: usize,
    mean: f64,
    scale: f64,
}

#[derive(Debug, Clone)]
pub struct ColumnTransformer {
    encoders: Vec<Encoder>,
    scalers: Vec<Scaler>,
    width: usize,
}

impl ColumnTransformer {
    pub fn new(artifact: PreprocessorArtifact) -> Result<Self> {
        let mut offset = 0;

        let mut encoders = Vec::with_capacity(artifact.categorical.len());
        for col in artifact.categorical {
            let mut positions = AHashMap::with_capacity(col.categories.len());
            for (i, category) in col.categories.iter().enumerate() {
                if positions.insert(category.clone(), offset + i).is_some() {
                    return Err(Error::InvalidArtifact(format!(
                        "duplicate category '{}' in column '{}'",
                        category, col.column
                    )));
                }
            }
            offset += col.categories.len();
            encoders.push(Encoder {
                column: col.column,
                positions,
            });
        }

        let mut scalers = Vec::with_capacity(artifact.numeric.len());
        for col in artifact.numeric {
            if !col.mean.is_finite() || !col.scale.is_finite() {
                return Err(Error::InvalidArtifact(format!(
                    "non-finite scaling parameters for column '{}'",
                    col.column
                )));
            }
            scalers.push(Scaler {
                column: col.column,
                offset,
                mean: col.mean,
                // a constant training column has zero variance
                scale: if col.scale == 0.0 { 1.0 } else { col.scale },
            });
            offset += 1;
        }

        Ok(Self {
            encoders,
            scalers,
            width: offset,
        })
    }

    /// Length of every transformed feature vector.
    pub fn output_width(&self) -> usize {
        self.width
    }

    pub fn categorical_columns(&self) -> impl Iterator<Item = &str> {
        self.encoders.iter().map(|e| e.column.as_str())
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.scalers.iter().map(|s| s.column.as_str())
    }

    /// Transform every frame row. Fails when a transformer column is absent
    /// from the frame or a numeric cell cannot be read as a number.
    pub fn transform(&self, frame: &Frame) -> Result<Vec<Vec<f64>>> {
        let missing: Vec<String> = self
            .categorical_columns()
            .chain(self.numeric_columns())
            .filter(|c| frame.column_index(c).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingColumns(missing));
        }

        let cat_idx: Vec<usize> = self
            .encoders
            .iter()
            .filter_map(|e| frame.column_index(&e.column))
            .collect();
        let num_idx: Vec<usize> = self
            .scalers
            .iter()
            .filter_map(|s| frame.column_index(&s.column))
            .collect();

        frame
            .rows()
            .iter()
            .map(|row| self.transform_row(row, &cat_idx, &num_idx))
            .collect()
    }

    fn transform_row(&self, row: &[Cell], cat_idx: &[usize], num_idx: &[usize]) -> Result<Vec<f64>> {
        let mut features = vec![0.0; self.width];

        for (encoder, &idx) in self.encoders.iter().zip(cat_idx) {
            if let Some(category) = row[idx].to_category() {
                if let Some(&pos) = encoder.positions.get(&category) {
                    features[pos] = 1.0;
                }
            }
        }

        for (scaler, &idx) in self.scalers.iter().zip(num_idx) {
            let cell = &row[idx];
            let value = match cell {
                Cell::Missing => return Err(Error::MissingValue(scaler.column.clone())),
                Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| Error::NotNumeric {
                    column: scaler.column.clone(),
                    value: s.clone(),
                })?,
                other => other.to_f64().unwrap_or(f64::NAN),
            };
            if value.is_nan() {
                return Err(Error::MissingValue(scaler.column.clone()));
            }
            features[scaler.offset] = (value - scaler.mean) / scaler.scale;
        }

        Ok(features)
    }
}
