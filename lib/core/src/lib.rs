//! # BloomDiet Core
//!
//! Core library for the BloomDiet inference service.
//!
//! This crate provides the prediction request pipeline:
//!
//! - [`Record`] / [`Cell`] - loosely-typed input cases
//! - [`FeatureSchema`] - the ordered columns a fitted pipeline expects
//! - [`Normalizer`] - reindexing, type coercion, gap filling and BMI derivation
//! - [`LabelCodec`] - class index to label mapping
//! - [`FittedPipeline`] - the seam for a trained model, with
//!   [`RandomForestPipeline`] as the shipped implementation
//! - [`Predictor`] - ties the above together and builds [`PredictionResult`]s
//!
//! ## Example
//!
//! ```rust
//! use bloomdiet_core::{LabelCodec, NormalizationPolicy, PipelineArtifact, Predictor, RandomForestPipeline, Record};
//! use std::sync::Arc;
//!
//! let artifact: PipelineArtifact = serde_json::from_value(serde_json::json!({
//!     "feature_names_in": ["gender", "age"],
//!     "preprocessor": {
//!         "categorical": [{"column": "gender", "categories": ["Female", "Male"]}],
//!         "numeric": [{"column": "age", "mean": 40.0, "scale": 10.0}]
//!     },
//!     "forest": {"n_classes": 2, "trees": [{"nodes": [
//!         {"split": {"feature": 2, "threshold": 0.0, "left": 1, "right": 2}},
//!         {"leaf": {"value": [3.0, 1.0]}},
//!         {"leaf": {"value": [1.0, 3.0]}}
//!     ]}]}
//! })).unwrap();
//!
//! let pipeline = Arc::new(RandomForestPipeline::new(artifact).unwrap());
//! let codec = Arc::new(LabelCodec::new(vec!["Balanced".into(), "Low_Carb".into()]).unwrap());
//! let policy = NormalizationPolicy { required: vec!["gender".into()], ..Default::default() };
//! let predictor = Predictor::new(pipeline, codec, policy).unwrap();
//!
//! let record = Record::from_json(serde_json::json!({"gender": "Male", "age": 62})).unwrap();
//! let result = predictor.predict_one(record).unwrap();
//! assert_eq!(result.prediction, "Low_Carb");
//! ```

pub mod codec;
pub mod error;
pub mod forest;
pub mod normalize;
pub mod pipeline;
pub mod predictor;
pub mod preprocess;
pub mod record;
pub mod schema;

pub use codec::{LabelCodec, LabelCodecArtifact};
pub use error::{Error, Result};
pub use forest::{
    DecisionTree, ForestArtifact, PipelineArtifact, RandomForest, RandomForestPipeline, TreeArtifact,
    TreeNode, FORMAT_VERSION,
};
pub use normalize::{BmiDerivation, NormalizationPolicy, NormalizedRecord, Normalizer};
pub use pipeline::{argmax, FittedPipeline};
pub use predictor::{ClassProbabilities, PredictionResult, Predictor, SchemaInfo};
pub use preprocess::{ColumnTransformer, OneHotColumn, PreprocessorArtifact, ScaledColumn};
pub use record::{Cell, Frame, Record};
pub use schema::{FeatureKind, FeatureSchema};
