// Artifact encoding: JSON, gzip-compressed JSON and bincode, picked by extension
use bloomdiet_core::{Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    GzipJson,
    Bincode,
}

impl ArtifactFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if name.ends_with(".json.gz") || name.ends_with(".gz") {
            Ok(ArtifactFormat::GzipJson)
        } else if name.ends_with(".json") {
            Ok(ArtifactFormat::Json)
        } else if name.ends_with(".bin") || name.ends_with(".bincode") {
            Ok(ArtifactFormat::Bincode)
        } else {
            Err(Error::Storage(format!(
                "unrecognized artifact extension: {}",
                path.display()
            )))
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            ArtifactFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
            ArtifactFormat::GzipJson => {
                let mut json = Vec::new();
                GzDecoder::new(bytes).read_to_end(&mut json)?;
                serde_json::from_slice(&json).map_err(|e| Error::Serialization(e.to_string()))
            }
            ArtifactFormat::Bincode => {
                bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            ArtifactFormat::Json => {
                serde_json::to_vec_pretty(value).map_err(|e| Error::Serialization(e.to_string()))
            }
            ArtifactFormat::GzipJson => {
                let json = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&json)?;
                Ok(encoder.finish()?)
            }
            ArtifactFormat::Bincode => {
                bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))
            }
        }
    }
}

/// Raw artifact bytes with their SHA-256 digest.
#[derive(Debug, Clone)]
pub struct ArtifactBytes {
    pub bytes: Vec<u8>,
    pub sha256: String,
}

impl ArtifactBytes {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| Error::Storage(format!("failed to read {}: {}", path.display(), e)))?;
        let sha256 = sha256_hex(&bytes);
        Ok(Self { bytes, sha256 })
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Read and decode an artifact, returning the value and the file's digest.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<(T, String)> {
    let format = ArtifactFormat::from_path(path)?;
    let raw = ArtifactBytes::read(path)?;
    let value = format.decode(&raw.bytes).map_err(|e| match e {
        Error::Serialization(msg) => {
            Error::Serialization(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })?;
    Ok((value, raw.sha256))
}

/// Encode a value in the format `path`'s extension selects.
pub fn encode_for<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>> {
    ArtifactFormat::from_path(path)?.encode(value)
}

/// Atomically replace `path` with `bytes`, creating parent directories.
pub fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite);
    file.write(|f| f.write_all(bytes))
        .map_err(|e| Error::Storage(format!("failed to write {}: {}", path.display(), e)))
}

/// Encode and atomically write an artifact. Returns the written digest.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<String> {
    let bytes = encode_for(path, value)?;
    write(path, &bytes)?;
    Ok(sha256_hex(&bytes))
}
