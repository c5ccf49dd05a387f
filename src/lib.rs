//! # BloomDiet
//!
//! A diet-recommendation inference service. A random-forest pipeline
//! fitted offline is loaded once at startup and served over HTTP.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! bloomdiet --model-path models/diet_recommendation_rf_model.json \
//!           --labels-path models/label_encoder.json --http-port 8000
//! curl -X POST localhost:8000/predict-one -H 'content-type: application/json' \
//!      -d '{"data": {"gender": "Male", "age": 30, "height_cm": 170, "weight_kg": 70}}'
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use bloomdiet::prelude::*;
//!
//! let artifacts = ArtifactStore::new("models/diet_recommendation_rf_model.json", "models/label_encoder.json")
//!     .load()
//!     .unwrap();
//! let predictor = Predictor::new(artifacts.pipeline(), artifacts.codec.clone(), NormalizationPolicy::default()).unwrap();
//!
//! let record = Record::from_json(serde_json::json!({
//!     "gender": "Female", "age": 41, "height_cm": 162, "weight_kg": 58
//! })).unwrap();
//! let result = predictor.predict_one(record).unwrap();
//! println!("{} {:?}", result.prediction, result.probabilities);
//! ```
//!
//! ## Crate Structure
//!
//! - `bloomdiet-core` - records, normalization, label codec, random-forest pipeline, predictor
//! - `bloomdiet-storage` - artifact loading and saving
//! - `bloomdiet-api` - REST API

pub use bloomdiet_core::{
    Cell, Error, FeatureSchema, FittedPipeline, Frame, LabelCodec, NormalizationPolicy, Normalizer,
    PipelineArtifact, PredictionResult, Predictor, RandomForestPipeline, Record, Result, SchemaInfo,
};

pub use bloomdiet_storage::{ArtifactStore, LoadedArtifacts};

pub use bloomdiet_api::{RestApi, RestConfig, ServingContext, UploadLimits};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ArtifactStore, Cell, Error, FeatureSchema, FittedPipeline, LabelCodec, LoadedArtifacts,
        NormalizationPolicy, PredictionResult, Predictor, RandomForestPipeline, Record, RestApi,
        RestConfig, Result, ServingContext,
    };
}
