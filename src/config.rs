//! Compiler configuration.
//!
//! Follows the teacher's `CompilerConfig` builder pattern: a small struct
//! with builder methods plus an optional on-disk `home.toml`, read with
//! `serde`/`toml` for the handful of settings that make sense ahead of a
//! package manager existing.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::codegen::host_target_triple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    #[default]
    O0,
    O1,
    O2,
    O3,
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptimizationLevel::O0 => "O0",
            OptimizationLevel::O1 => "O1",
            OptimizationLevel::O2 => "O2",
            OptimizationLevel::O3 => "O3",
        };
        write!(f, "{}", s)
    }
}

const DEFAULT_CACHE_DIR: &str = ".home-cache";

/// Project-local `home.toml`, read ahead of any package manager existing.
/// Every field is optional; an absent file is equivalent to all defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectManifest {
    pub cache_dir: Option<PathBuf>,
    pub target: Option<String>,
}

impl ProjectManifest {
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum ManifestError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io { path, message } => {
                write!(f, "failed to read {}: {}", path.display(), message)
            }
            ManifestError::Parse { path, message } => {
                write!(f, "failed to parse {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ManifestError {}

/// Compiler configuration: target selection, the optimization level
/// (accepted for forward compatibility — only `O0` has real effect given
/// the fixed-role codegen), the cache directory, and the kernel-mode flag.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub target: String,
    pub optimization_level: OptimizationLevel,
    pub cache_dir: PathBuf,
    pub kernel_mode: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            target: host_target_triple().to_string(),
            optimization_level: OptimizationLevel::default(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            kernel_mode: false,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_kernel_mode(mut self, kernel_mode: bool) -> Self {
        self.kernel_mode = kernel_mode;
        self
    }

    /// Applies a project manifest on top of the current configuration;
    /// fields absent from the manifest leave the existing value untouched.
    pub fn merge_manifest(mut self, manifest: &ProjectManifest) -> Self {
        if let Some(dir) = &manifest.cache_dir {
            self.cache_dir = dir.clone();
        }
        if let Some(target) = &manifest.target {
            self.target = target.clone();
        }
        self
    }

    /// Loads `home.toml` from `project_dir` if present, merging it in;
    /// a missing manifest file is not an error.
    pub fn with_project_manifest(self, project_dir: &Path) -> Result<Self, ManifestError> {
        let manifest_path = project_dir.join("home.toml");
        if !manifest_path.exists() {
            return Ok(self);
        }
        let manifest = ProjectManifest::read(&manifest_path)?;
        Ok(self.merge_manifest(&manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_dir_matches_spec() {
        let config = CompilerConfig::new();
        assert_eq!(config.cache_dir, PathBuf::from(".home-cache"));
        assert!(!config.kernel_mode);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = CompilerConfig::new()
            .with_cache_dir("/tmp/cache")
            .with_kernel_mode(true)
            .with_optimization_level(OptimizationLevel::O2);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert!(config.kernel_mode);
        assert_eq!(config.optimization_level, OptimizationLevel::O2);
    }

    #[test]
    fn missing_manifest_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = CompilerConfig::new().with_project_manifest(dir.path()).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from(".home-cache"));
    }

    #[test]
    fn manifest_overrides_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("home.toml"), "cache_dir = \"build-cache\"\n").unwrap();
        let config = CompilerConfig::new().with_project_manifest(dir.path()).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("build-cache"));
    }
}
