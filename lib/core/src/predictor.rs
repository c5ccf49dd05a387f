use crate::normalize::{NormalizationPolicy, Normalizer};
use crate::pipeline::{argmax, FittedPipeline};
use crate::{Error, Frame, LabelCodec, Record, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;
use tracing::debug;

/// Probability per class label, kept in label codec order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities(Vec<(String, f64)>);

impl ClassProbabilities {
    pub fn get(&self, label: &str) -> Option<f64> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, p)| *p)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(l, p)| (l.as_str(), *p))
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|(_, p)| p).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ClassProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, p) in &self.0 {
            map.serialize_entry(label, p)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PredictionResult {
    pub prediction: String,
    pub probabilities: ClassProbabilities,
}

/// What callers need to build valid records.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SchemaInfo {
    pub expected_columns: Vec<String>,
    pub cat_cols: Vec<String>,
    pub num_cols: Vec<String>,
    pub classes: Vec<String>,
}

/// Normalizes records, runs the fitted pipeline and decodes its output.
///
/// Holds only read-only state; one instance serves every request.
pub struct Predictor {
    pipeline: Arc<dyn FittedPipeline>,
    codec: Arc<LabelCodec>,
    normalizer: Normalizer,
}

impl Predictor {
    pub fn new(
        pipeline: Arc<dyn FittedPipeline>,
        codec: Arc<LabelCodec>,
        policy: NormalizationPolicy,
    ) -> Result<Self> {
        if pipeline.n_classes() != codec.len() {
            return Err(Error::ClassCountMismatch {
                codec: codec.len(),
                pipeline: pipeline.n_classes(),
            });
        }

        let normalizer = Normalizer::new(pipeline.feature_schema().cloned(), policy);
        Ok(Self {
            pipeline,
            codec,
            normalizer,
        })
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn classes(&self) -> &[String] {
        self.codec.classes()
    }

    pub fn predict_one(&self, record: Record) -> Result<PredictionResult> {
        let frame = self.normalizer.prepare_single(record)?;
        let mut results = self.predict_frame(&frame)?;
        results
            .pop()
            .ok_or_else(|| Error::InvalidRecord("pipeline returned no prediction".to_string()))
    }

    /// One result per record, in input order.
    pub fn predict_batch(&self, records: Vec<Record>) -> Result<Vec<PredictionResult>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let frame = self.normalizer.prepare_frame(records)?;
        self.predict_frame(&frame)
    }

    /// Run the pipeline on an already prepared frame.
    pub fn predict_frame(&self, frame: &Frame) -> Result<Vec<PredictionResult>> {
        let probas = self.pipeline.predict_proba(frame)?;
        debug!(rows = frame.n_rows(), "pipeline evaluated");

        if probas.len() != frame.n_rows() {
            return Err(Error::FeatureCountMismatch {
                expected: frame.n_rows(),
                actual: probas.len(),
            });
        }

        probas.into_iter().map(|proba| self.decode(proba)).collect()
    }

    fn decode(&self, proba: Vec<f64>) -> Result<PredictionResult> {
        let classes = self.codec.classes();
        if proba.len() != classes.len() {
            return Err(Error::ClassCountMismatch {
                codec: classes.len(),
                pipeline: proba.len(),
            });
        }

        let prediction = self.codec.decode(argmax(&proba))?.to_string();
        let probabilities = ClassProbabilities(classes.iter().cloned().zip(proba).collect());
        Ok(PredictionResult {
            prediction,
            probabilities,
        })
    }

    pub fn schema_info(&self) -> SchemaInfo {
        let (expected_columns, cat_cols, num_cols) = match self.normalizer.schema() {
            Some(schema) => (
                schema.columns().to_vec(),
                schema.categorical().to_vec(),
                schema.numeric().to_vec(),
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        SchemaInfo {
            expected_columns,
            cat_cols,
            num_cols,
            classes: self.codec.classes().to_vec(),
        }
    }
}
