//! Random-forest pipeline
//!
//! A fitted column transformer followed by an ensemble of decision trees.
//! Each tree maps a feature vector to a leaf class distribution; the forest
//! averages those distributions.

use crate::pipeline::FittedPipeline;
use crate::preprocess::{ColumnTransformer, PreprocessorArtifact};
use crate::{Error, FeatureSchema, Frame, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

/// Serialized form of a fitted pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    /// Column order seen at fit time. `None` when it was not recorded.
    #[serde(default)]
    pub feature_names_in: Option<Vec<String>>,
    pub preprocessor: PreprocessorArtifact,
    pub forest: ForestArtifact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestArtifact {
    pub n_classes: usize,
    pub trees: Vec<TreeArtifact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeArtifact {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Go `left` when `x[feature] <= threshold`, otherwise `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class weights or counts at the leaf.
    Leaf { value: Vec<f64> },
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf(Vec<f64>),
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn new(artifact: TreeArtifact, n_features: usize, n_classes: usize) -> Result<Self> {
        if artifact.nodes.is_empty() {
            return Err(Error::InvalidArtifact("tree has no nodes".to_string()));
        }

        let len = artifact.nodes.len();
        let mut nodes = Vec::with_capacity(len);
        for (i, node) in artifact.nodes.into_iter().enumerate() {
            let node = match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // children after parent: traversal always terminates
                    if left <= i || right <= i || left >= len || right >= len {
                        return Err(Error::InvalidArtifact(format!(
                            "node {} has invalid children ({}, {})",
                            i, left, right
                        )));
                    }
                    if feature >= n_features {
                        return Err(Error::InvalidArtifact(format!(
                            "node {} splits on feature {} but only {} features exist",
                            i, feature, n_features
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(Error::InvalidArtifact(format!("node {} has NaN threshold", i)));
                    }
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    }
                }
                TreeNode::Leaf { value } => Node::Leaf(normalize_leaf(i, value, n_classes)?),
            };
            nodes.push(node);
        }

        Ok(Self { nodes })
    }

    /// Class distribution of the leaf reached by `features`.
    pub fn predict_proba(&self, features: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf(dist) => return dist,
            }
        }
    }
}

fn normalize_leaf(node: usize, value: Vec<f64>, n_classes: usize) -> Result<Vec<f64>> {
    if value.len() != n_classes {
        return Err(Error::InvalidArtifact(format!(
            "leaf {} has {} class weights, expected {}",
            node,
            value.len(),
            n_classes
        )));
    }
    if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(Error::InvalidArtifact(format!("leaf {} has a negative or non-finite weight", node)));
    }
    let total: f64 = value.iter().sum();
    if total <= 0.0 {
        return Err(Error::InvalidArtifact(format!("leaf {} has zero total weight", node)));
    }
    Ok(value.into_iter().map(|v| v / total).collect())
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    pub fn new(artifact: ForestArtifact, n_features: usize) -> Result<Self> {
        if artifact.n_classes == 0 {
            return Err(Error::InvalidArtifact("forest has zero classes".to_string()));
        }
        if artifact.trees.is_empty() {
            return Err(Error::InvalidArtifact("forest has no trees".to_string()));
        }

        let trees = artifact
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| {
                DecisionTree::new(tree, n_features, artifact.n_classes).map_err(|e| match e {
                    Error::InvalidArtifact(msg) => Error::InvalidArtifact(format!("tree {}: {}", i, msg)),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            trees,
            n_classes: artifact.n_classes,
        })
    }

    /// Mean of the per-tree leaf distributions.
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.predict_proba(features)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Column transformer + random forest, loaded from a [`PipelineArtifact`].
#[derive(Debug, Clone)]
pub struct RandomForestPipeline {
    schema: Option<FeatureSchema>,
    transformer: ColumnTransformer,
    forest: RandomForest,
}

impl RandomForestPipeline {
    pub fn new(artifact: PipelineArtifact) -> Result<Self> {
        if artifact.format_version != FORMAT_VERSION {
            return Err(Error::InvalidArtifact(format!(
                "unsupported format version {} (expected {})",
                artifact.format_version, FORMAT_VERSION
            )));
        }

        let schema = match artifact.feature_names_in {
            Some(columns) => Some(FeatureSchema::new(
                columns,
                artifact.preprocessor.categorical.iter().map(|c| c.column.clone()).collect(),
                artifact.preprocessor.numeric.iter().map(|c| c.column.clone()).collect(),
            )?),
            None => None,
        };

        let transformer = ColumnTransformer::new(artifact.preprocessor)?;
        let forest = RandomForest::new(artifact.forest, transformer.output_width())?;

        Ok(Self {
            schema,
            transformer,
            forest,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.forest.n_trees()
    }

    pub fn n_features(&self) -> usize {
        self.transformer.output_width()
    }
}

impl TryFrom<PipelineArtifact> for RandomForestPipeline {
    type Error = Error;

    fn try_from(artifact: PipelineArtifact) -> Result<Self> {
        RandomForestPipeline::new(artifact)
    }
}

impl FittedPipeline for RandomForestPipeline {
    fn feature_schema(&self) -> Option<&FeatureSchema> {
        self.schema.as_ref()
    }

    fn n_classes(&self) -> usize {
        self.forest.n_classes
    }

    fn predict_proba(&self, frame: &Frame) -> Result<Vec<Vec<f64>>> {
        let features = self.transformer.transform(frame)?;
        Ok(features
            .par_iter()
            .map(|row| self.forest.predict_proba(row))
            .collect())
    }
}
