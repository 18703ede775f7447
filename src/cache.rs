//! Content-addressed incremental compilation cache.
//!
//! Keyed by `SHA-256(source bytes ‖ sorted transitive import hashes ‖
//! compiler version ‖ target triple)`. Entries live in a directory as a
//! pair of files: the artifact itself and a metadata file recording the
//! key's constituent fields. Writes are temp-file-then-rename so a reader
//! never observes a partially written entry, and the cache directory can
//! be shared by concurrent builds.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    Io { path: PathBuf, message: String },
    /// A metadata file exists but couldn't be parsed; treated as a miss,
    /// not a fatal error — the entry is silently overwritten on the next
    /// successful build.
    Corrupt { path: PathBuf },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io { path, message } => {
                write!(f, "cache I/O error at {}: {}", path.display(), message)
            }
            CacheError::Corrupt { path } => write!(f, "corrupt cache metadata at {}", path.display()),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyInputs {
    pub source_hash: String,
    pub import_hashes: Vec<String>,
    pub compiler_version: String,
    pub target: String,
}

impl CacheKeyInputs {
    /// The composite cache key: hex-encoded SHA-256 over every input field
    /// in a fixed, documented order so it is reproducible across runs.
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source_hash.as_bytes());
        for h in &self.import_hashes {
            hasher.update(h.as_bytes());
        }
        hasher.update(self.compiler_version.as_bytes());
        hasher.update(self.target.as_bytes());
        hex_encode(hasher.finalize().into())
    }

    fn to_metadata(&self) -> String {
        format!(
            "source_hash: {}\nimport_hashes: {}\ncompiler_version: {}\ntarget: {}\n",
            self.source_hash,
            self.import_hashes.join(","),
            self.compiler_version,
            self.target,
        )
    }

    fn from_metadata(text: &str) -> Option<Self> {
        let mut source_hash = None;
        let mut import_hashes = None;
        let mut compiler_version = None;
        let mut target = None;
        for line in text.lines() {
            let (field, value) = line.split_once(": ")?;
            match field {
                "source_hash" => source_hash = Some(value.to_string()),
                "import_hashes" => {
                    import_hashes = Some(if value.is_empty() {
                        Vec::new()
                    } else {
                        value.split(',').map(|s| s.to_string()).collect()
                    })
                }
                "compiler_version" => compiler_version = Some(value.to_string()),
                "target" => target = Some(value.to_string()),
                _ => return None,
            }
        }
        Some(CacheKeyInputs {
            source_hash: source_hash?,
            import_hashes: import_hashes?,
            compiler_version: compiler_version?,
            target: target?,
        })
    }
}

pub fn hash_source(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(hasher.finalize().into())
}

fn hex_encode(bytes: [u8; 32]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Cache { dir: dir.into() }
    }

    fn artifact_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.meta", key))
    }

    /// Probe the cache; returns the cached artifact's bytes on a verified
    /// hit. A malformed metadata file is reported as `CacheError::Corrupt`
    /// and logged at `warn`, not propagated as fatal — callers should
    /// treat it the same as a miss.
    pub fn get(&self, inputs: &CacheKeyInputs) -> Result<Option<Vec<u8>>, CacheError> {
        let key = inputs.key();
        let meta_path = self.metadata_path(&key);
        if !meta_path.exists() {
            return Ok(None);
        }
        let meta_text = fs::read_to_string(&meta_path).map_err(|e| CacheError::Io {
            path: meta_path.clone(),
            message: e.to_string(),
        })?;
        let Some(parsed) = CacheKeyInputs::from_metadata(&meta_text) else {
            warn!(path = %meta_path.display(), "corrupt cache metadata, treating as miss");
            return Err(CacheError::Corrupt { path: meta_path });
        };
        if parsed != *inputs {
            return Ok(None);
        }
        let artifact_path = self.artifact_path(&key);
        let bytes = fs::read(&artifact_path).map_err(|e| CacheError::Io {
            path: artifact_path,
            message: e.to_string(),
        })?;
        info!(key = %key, "cache hit");
        Ok(Some(bytes))
    }

    /// Atomically write an artifact plus its metadata: write to a temp
    /// file in the same directory, then rename, so concurrent readers
    /// never see a half-written entry.
    pub fn put(&self, inputs: &CacheKeyInputs, artifact: &[u8]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            message: e.to_string(),
        })?;
        let key = inputs.key();
        self.write_atomic(&self.artifact_path(&key), artifact)?;
        self.write_atomic(&self.metadata_path(&key), inputs.to_metadata().as_bytes())?;
        Ok(())
    }

    fn write_atomic(&self, dest: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        let tmp = dest.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            message: e.to_string(),
        })?;
        fs::rename(&tmp, dest).map_err(|e| CacheError::Io {
            path: dest.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inputs() -> CacheKeyInputs {
        CacheKeyInputs {
            source_hash: hash_source(b"fn main() { return }"),
            import_hashes: vec!["abc".to_string(), "def".to_string()],
            compiler_version: "0.1.0".to_string(),
            target: "x86_64-unknown-linux-gnu".to_string(),
        }
    }

    #[test]
    fn miss_then_hit_round_trips_artifact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let inputs = sample_inputs();

        assert!(cache.get(&inputs).unwrap().is_none());
        cache.put(&inputs, b"ELF-bytes-stand-in").unwrap();
        let hit = cache.get(&inputs).unwrap();
        assert_eq!(hit, Some(b"ELF-bytes-stand-in".to_vec()));
    }

    #[test]
    fn key_is_deterministic_for_same_inputs() {
        let a = sample_inputs();
        let b = sample_inputs();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn key_changes_with_import_hashes() {
        let mut a = sample_inputs();
        let b = sample_inputs();
        a.import_hashes.push("ghi".to_string());
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn corrupt_metadata_is_reported_not_panicked() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let inputs = sample_inputs();
        fs::create_dir_all(dir.path()).unwrap();
        let key = inputs.key();
        fs::write(cache.metadata_path(&key), "not: valid\ngarbage").unwrap();
        let err = cache.get(&inputs).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn different_source_hash_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let inputs = sample_inputs();
        cache.put(&inputs, b"artifact").unwrap();

        let mut other = sample_inputs();
        other.source_hash = hash_source(b"fn main() { let x = 1; return }");
        assert!(cache.get(&other).unwrap().is_none());
    }
}
