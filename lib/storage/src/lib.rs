pub mod artifact;
pub mod manager;

pub use artifact::{sha256_hex, ArtifactBytes, ArtifactFormat};
pub use manager::{ArtifactStore, LoadedArtifacts};
