use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    #[error("columns are missing: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("could not convert string to float: '{value}' (column '{column}')")]
    NotNumeric { column: String, value: String },

    #[error("input contains NaN in column '{0}'")]
    MissingValue(String),

    #[error("unknown class index: {index} (codec has {len} classes)")]
    UnknownClassIndex { index: usize, len: usize },

    #[error("class count mismatch: label codec has {codec} classes, pipeline emits {pipeline}")]
    ClassCountMismatch { codec: usize, pipeline: usize },

    #[error("feature count mismatch: expected {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("record {index}: {source}")]
    Row {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Attach the position of the failing row inside a batch.
    pub fn at_row(self, index: usize) -> Self {
        Error::Row {
            index,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through row wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Row { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the failure comes from required-field validation.
    pub fn is_missing_fields(&self) -> bool {
        matches!(self.root(), Error::MissingRequiredFields(_))
    }
}
