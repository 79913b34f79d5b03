//! # Content Hashing Module
//!
//! Calcola il digest SHA-256 del contenuto di un file, usato come chiave di cache.
//!
//! ## Responsabilità:
//! - Lettura a chunk fissi (8 KiB) per non caricare interi video in memoria
//! - Rappresentazione tipizzata del digest (`ContentDigest`) con encoding hex
//! - Serializzazione del digest come stringa hex nel record di cache
//!
//! Due file con gli stessi byte hanno sempre lo stesso digest; la probabilità
//! di collisione è considerata nulla.

use crate::error::{CompressError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::io::AsyncReadExt;

/// Size of each read when streaming a file into the hasher.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// SHA-256 digest of a file's full byte content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Digest of an in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Name of the cached artifact for this digest, keeping the source extension.
    pub fn artifact_filename(&self, source: &Path) -> String {
        match source.extension() {
            Some(ext) => format!("{}.{}", self.to_hex(), ext.to_string_lossy()),
            None => self.to_hex(),
        }
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| format!("invalid digest {s:?}: {e}"))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| format!("digest {s:?} has {} bytes, expected 32", v.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Streams `path` through SHA-256 in [`CHUNK_SIZE`] reads.
pub async fn digest(path: &Path) -> Result<ContentDigest> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| CompressError::io(path, e))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| CompressError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(ContentDigest(hasher.finalize().into()))
}
