//! Feature schema definitions
//!
//! The ordered column set a fitted pipeline expects, partitioned into
//! categorical and numeric columns. Columns in neither set are accepted
//! and dropped by the column transformer.

use crate::{Error, Result};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Whether a column is one-hot encoded, scaled, or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Categorical,
    Numeric,
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
    categorical: Vec<String>,
    numeric: Vec<String>,
}

impl FeatureSchema {
    /// Build and validate a schema.
    pub fn new(columns: Vec<String>, categorical: Vec<String>, numeric: Vec<String>) -> Result<Self> {
        let mut seen = AHashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(Error::InvalidArtifact(format!("duplicate column '{}'", column)));
            }
        }

        let categorical_set: AHashSet<&str> = categorical.iter().map(String::as_str).collect();
        for column in categorical.iter().chain(numeric.iter()) {
            if !seen.contains(column.as_str()) {
                return Err(Error::InvalidArtifact(format!(
                    "column '{}' is not among the expected columns",
                    column
                )));
            }
        }
        if let Some(both) = numeric.iter().find(|c| categorical_set.contains(c.as_str())) {
            return Err(Error::InvalidArtifact(format!(
                "column '{}' is both categorical and numeric",
                both
            )));
        }

        Ok(Self {
            columns,
            categorical,
            numeric,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    pub fn numeric(&self) -> &[String] {
        &self.numeric
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn kind(&self, name: &str) -> FeatureKind {
        if self.categorical.iter().any(|c| c == name) {
            FeatureKind::Categorical
        } else if self.numeric.iter().any(|c| c == name) {
            FeatureKind::Numeric
        } else {
            FeatureKind::Passthrough
        }
    }

    /// Kinds for every column, in column order.
    pub fn kinds(&self) -> Vec<FeatureKind> {
        self.columns.iter().map(|c| self.kind(c)).collect()
    }
}
