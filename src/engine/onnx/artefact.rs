use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::OnnxEngineError;

/// Model file whose digest is checked before the session is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnnxArtefact {
    /// Location of the artefact on disk.
    pub path: PathBuf,
    /// Expected SHA-256 checksum as hexadecimal. `None` skips verification.
    #[serde(default)]
    pub sha256: Option<String>,
}

impl OnnxArtefact {
    /// Verifies the artefact checksum when one is recorded.
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` when the computed digest differs from
    /// `sha256` and propagates I/O errors while reading the file.
    pub fn verify(&self) -> Result<(), OnnxEngineError> {
        let Some(expected) = self.sha256.as_deref().map(normalise_hex) else {
            return Ok(());
        };
        let actual = compute_sha256(&self.path)?;
        if actual == expected {
            Ok(())
        } else {
            Err(OnnxEngineError::ChecksumMismatch {
                path: self.path.clone(),
                expected,
                actual,
            })
        }
    }
}

/// Computes the lowercase hex SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns I/O errors from opening or reading the file.
pub fn compute_sha256(path: &Path) -> Result<String, OnnxEngineError> {
    let io = |source| OnnxEngineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = reader.read(&mut buffer).map_err(io)?;
        let Some(chunk) = buffer.get(..read) else {
            return Err(io(std::io::Error::other(
                "read reported bytes beyond buffer length",
            )));
        };
        if chunk.is_empty() {
            break;
        }
        hasher.update(chunk);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn normalise_hex(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
