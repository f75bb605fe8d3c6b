//! Lockfile hashing for content-addressed caching
//!
//! A lockfile's raw bytes are the lock specification. They are never parsed,
//! only hashed: same lockfile = same cache key = same build directory.

use crate::error::{DeplumiError, DeplumiResult};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// SHA3-256 digest of a lock specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Hash lock specification bytes
    pub fn of(lock_spec: &[u8]) -> Self {
        let digest = Sha3_256::digest(lock_spec);
        Self(digest.into())
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, used as the build directory name
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for CacheKey {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// A lockfile read from disk
#[derive(Debug, Clone)]
pub struct LockSpec {
    /// Where the bytes came from
    pub path: PathBuf,
    /// Raw lockfile contents
    pub bytes: Vec<u8>,
}

impl LockSpec {
    /// Read a lockfile
    pub async fn read(path: &Path) -> DeplumiResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeplumiError::LockfileMissing(path.to_path_buf())
            } else {
                DeplumiError::io(format!("reading lockfile {}", path.display()), e)
            }
        })?;

        debug!("Read lockfile {} ({} bytes)", path.display(), bytes.len());
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    /// Cache key for this lockfile's contents
    pub fn key(&self) -> CacheKey {
        CacheKey::of(&self.bytes)
    }
}
