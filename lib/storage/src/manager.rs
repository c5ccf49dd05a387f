use crate::artifact;
use bloomdiet_core::{
    Error, FittedPipeline, LabelCodec, LabelCodecArtifact, PipelineArtifact, RandomForestPipeline, Result,
};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything loaded at process start, shared read-only afterwards.
#[derive(Clone)]
pub struct LoadedArtifacts {
    pub pipeline: Arc<RandomForestPipeline>,
    pub codec: Arc<LabelCodec>,
    pub model_sha256: String,
    pub labels_sha256: String,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedArtifacts {
    pub fn pipeline(&self) -> Arc<dyn FittedPipeline> {
        self.pipeline.clone()
    }
}

/// Locates the fitted pipeline and label codec artifacts on disk.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    model_path: PathBuf,
    labels_path: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(model_path: P, labels_path: Q) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            labels_path: labels_path.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    #[inline]
    pub fn labels_path(&self) -> &Path {
        &self.labels_path
    }

    /// Load and cross-check both artifacts. Any failure here should stop the
    /// process before it serves requests.
    pub fn load(&self) -> Result<LoadedArtifacts> {
        info!("Loading model from: {}", self.model_path.display());
        let (pipeline_artifact, model_sha256): (PipelineArtifact, String) = artifact::load(&self.model_path)?;
        let pipeline = RandomForestPipeline::new(pipeline_artifact)?;

        info!("Loading label encoder from: {}", self.labels_path.display());
        let (codec_artifact, labels_sha256): (LabelCodecArtifact, String) = artifact::load(&self.labels_path)?;
        let codec = LabelCodec::try_from(codec_artifact)?;

        if pipeline.n_classes() != codec.len() {
            return Err(Error::ClassCountMismatch {
                codec: codec.len(),
                pipeline: pipeline.n_classes(),
            });
        }

        match pipeline.feature_schema() {
            Some(schema) => info!(
                "Pipeline expects {} columns ({} categorical, {} numeric)",
                schema.columns().len(),
                schema.categorical().len(),
                schema.numeric().len()
            ),
            None => info!("Pipeline has no recorded feature names; records pass through unnormalized"),
        }
        info!(
            "Loaded {} trees over {} features, {} classes",
            pipeline.n_trees(),
            pipeline.n_features(),
            codec.len()
        );

        Ok(LoadedArtifacts {
            pipeline: Arc::new(pipeline),
            codec: Arc::new(codec),
            model_sha256,
            labels_sha256,
            loaded_at: Utc::now(),
        })
    }

    /// Write both artifacts, e.g. after converting an exported model.
    ///
    /// Both are encoded before either file is touched. Each file is replaced
    /// atomically; if the label codec cannot be written, the previous model
    /// file is restored (or removed when there was none).
    pub fn save(&self, pipeline: &PipelineArtifact, codec: &LabelCodecArtifact) -> Result<()> {
        if pipeline.forest.n_classes != codec.classes.len() {
            return Err(Error::ClassCountMismatch {
                codec: codec.classes.len(),
                pipeline: pipeline.forest.n_classes,
            });
        }
        let model_bytes = artifact::encode_for(&self.model_path, pipeline)?;
        let labels_bytes = artifact::encode_for(&self.labels_path, codec)?;

        let previous_model = fs::read(&self.model_path).ok();
        artifact::write(&self.model_path, &model_bytes)?;

        if let Err(e) = artifact::write(&self.labels_path, &labels_bytes) {
            self.restore_model(previous_model);
            return Err(e);
        }
        info!("Saved model to {} and labels to {}", self.model_path.display(), self.labels_path.display());
        Ok(())
    }

    fn restore_model(&self, previous: Option<Vec<u8>>) {
        let restored = match previous {
            Some(bytes) => artifact::write(&self.model_path, &bytes),
            None => fs::remove_file(&self.model_path).map_err(Error::from),
        };
        if let Err(e) = restored {
            warn!("Could not roll back {}: {}", self.model_path.display(), e);
        }
    }
}
