use crate::{FeatureSchema, Frame, Result};

/// A fitted transformation + classification pipeline.
///
/// Implementations are immutable once loaded and are shared across request
/// handlers, hence the `Send + Sync` bound.
pub trait FittedPipeline: Send + Sync {
    /// The columns the pipeline was fitted on, if they can be introspected.
    fn feature_schema(&self) -> Option<&FeatureSchema>;

    /// Number of classes in every probability vector.
    fn n_classes(&self) -> usize;

    /// Per-row probability vectors, each of length [`n_classes`](Self::n_classes).
    /// The predicted class is the [`argmax`] of each vector.
    fn predict_proba(&self, frame: &Frame) -> Result<Vec<Vec<f64>>>;
}

/// Index of the first maximum; 0 for an empty slice.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
