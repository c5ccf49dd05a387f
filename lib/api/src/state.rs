use bloomdiet_core::{NormalizationPolicy, Predictor, Result};
use bloomdiet_storage::LoadedArtifacts;
use chrono::{DateTime, Utc};

/// Read-only context handed to every request handler.
pub struct ServingContext {
    predictor: Predictor,
    model_sha256: String,
    labels_sha256: String,
    loaded_at: DateTime<Utc>,
}

impl ServingContext {
    pub fn new(
        predictor: Predictor,
        model_sha256: impl Into<String>,
        labels_sha256: impl Into<String>,
        loaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            predictor,
            model_sha256: model_sha256.into(),
            labels_sha256: labels_sha256.into(),
            loaded_at,
        }
    }

    pub fn from_artifacts(artifacts: LoadedArtifacts, policy: NormalizationPolicy) -> Result<Self> {
        let predictor = Predictor::new(artifacts.pipeline(), artifacts.codec.clone(), policy)?;
        Ok(Self::new(
            predictor,
            artifacts.model_sha256,
            artifacts.labels_sha256,
            artifacts.loaded_at,
        ))
    }

    #[inline]
    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    #[inline]
    pub fn model_sha256(&self) -> &str {
        &self.model_sha256
    }

    #[inline]
    pub fn labels_sha256(&self) -> &str {
        &self.labels_sha256
    }

    #[inline]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}
