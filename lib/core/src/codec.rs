use crate::{Error, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Serialized form of a label codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCodecArtifact {
    pub classes: Vec<String>,
}

/// Bidirectional mapping between class index and label.
///
/// Class order is the order the fitted pipeline emits probabilities in.
#[derive(Debug, Clone)]
pub struct LabelCodec {
    classes: Vec<String>,
    lookup: AHashMap<String, usize>,
}

impl LabelCodec {
    pub fn new(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(Error::InvalidArtifact("label codec has no classes".to_string()));
        }

        let mut lookup = AHashMap::with_capacity(classes.len());
        for (index, label) in classes.iter().enumerate() {
            if lookup.insert(label.clone(), index).is_some() {
                return Err(Error::InvalidArtifact(format!("duplicate class label '{}'", label)));
            }
        }

        Ok(Self { classes, lookup })
    }

    #[inline]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Label for a class index.
    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(Error::UnknownClassIndex {
                index,
                len: self.classes.len(),
            })
    }

    /// Class index for a label.
    pub fn encode(&self, label: &str) -> Option<usize> {
        self.lookup.get(label).copied()
    }
}

impl TryFrom<LabelCodecArtifact> for LabelCodec {
    type Error = Error;

    fn try_from(artifact: LabelCodecArtifact) -> Result<Self> {
        LabelCodec::new(artifact.classes)
    }
}
