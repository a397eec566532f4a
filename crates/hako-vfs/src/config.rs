//! Backend configuration.
//!
//! ```toml
//! backend = "local"
//! sandbox_root = "/srv/agent-workspace"
//! tail_window = 65536
//! ```
//!
//! Leaving `sandbox_root` out of a local configuration disables
//! sandboxing. Setting it to an empty string is rejected rather than read
//! as "unset".

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::backends::{DEFAULT_TAIL_WINDOW, LocalBackend, MemoryBackend};
use crate::ops::VfsOps;

/// Which backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-memory tree.
    #[default]
    Memory,
    /// Real filesystem, optionally confined to `sandbox_root`.
    Local,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("sandbox_root is set but empty (omit it to disable sandboxing)")]
    EmptySandboxRoot,

    #[error("tail_window must be at least 1 byte")]
    ZeroTailWindow,
}

/// VFS configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Backend to build.
    pub backend: BackendKind,

    /// Sandbox root for the local backend. `None` means unsandboxed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_root: Option<PathBuf>,

    /// Bytes read from the end of a file for tail reads (local backend).
    pub tail_window: usize,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            sandbox_root: None,
            tail_window: DEFAULT_TAIL_WINDOW,
        }
    }
}

impl VfsConfig {
    /// In-memory backend.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Local backend confined to `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Local,
            sandbox_root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Local backend without a sandbox root.
    pub fn unsandboxed() -> Self {
        Self {
            backend: BackendKind::Local,
            ..Self::default()
        }
    }

    /// Set the tail read window.
    pub fn with_tail_window(mut self, bytes: usize) -> Self {
        self.tail_window = bytes;
        self
    }

    /// Parse and validate TOML.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .sandbox_root
            .as_ref()
            .is_some_and(|root| root.as_os_str().is_empty())
        {
            return Err(ConfigError::EmptySandboxRoot);
        }
        if self.tail_window == 0 {
            return Err(ConfigError::ZeroTailWindow);
        }
        Ok(())
    }
}

/// Construct the configured backend.
///
/// Each call builds a new, independent instance; share it by cloning the
/// returned `Arc`.
pub fn build_backend(config: &VfsConfig) -> Result<Arc<dyn VfsOps>, ConfigError> {
    config.validate()?;
    let backend: Arc<dyn VfsOps> = match (config.backend, &config.sandbox_root) {
        (BackendKind::Memory, _) => Arc::new(MemoryBackend::new()),
        (BackendKind::Local, Some(root)) => {
            Arc::new(LocalBackend::new(root.clone()).with_tail_window(config.tail_window))
        }
        (BackendKind::Local, None) => {
            tracing::warn!("local backend configured without sandbox_root");
            Arc::new(LocalBackend::unsandboxed().with_tail_window(config.tail_window))
        }
    };
    tracing::debug!(backend = backend.name(), "built vfs backend");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VfsConfig::from_toml_str("").unwrap();
        assert_eq!(config, VfsConfig::memory());
        assert_eq!(config.tail_window, DEFAULT_TAIL_WINDOW);
    }

    #[test]
    fn test_parse_local() {
        let config = VfsConfig::from_toml_str(
            r#"
            backend = "local"
            sandbox_root = "/srv/work"
            tail_window = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.sandbox_root.as_deref(), Some(Path::new("/srv/work")));
        assert_eq!(config.tail_window, 1024);
    }

    #[test]
    fn test_empty_root_rejected() {
        let err = VfsConfig::from_toml_str("backend = \"local\"\nsandbox_root = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::EmptySandboxRoot));

        let err = build_backend(&VfsConfig::local("")).err().unwrap();
        assert!(matches!(err, ConfigError::EmptySandboxRoot));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            VfsConfig::from_toml_str("backend = \"s3\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            VfsConfig::from_toml_str("tail_window = 0"),
            Err(ConfigError::ZeroTailWindow)
        ));
    }

    #[test]
    fn test_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vfs.toml");
        std::fs::write(&path, "backend = \"local\"\n").unwrap();

        let config = VfsConfig::load(&path).unwrap();
        assert_eq!(config, VfsConfig::unsandboxed());

        let err = VfsConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = VfsConfig::local("/srv/work").with_tail_window(4096);
        let text = toml::to_string(&config).unwrap();
        assert_eq!(VfsConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_build_backend() {
        let memory = build_backend(&VfsConfig::memory()).unwrap();
        assert_eq!(memory.name(), "memory");
        assert!(!memory.capabilities().binary);

        let dir = tempfile::TempDir::new().unwrap();
        let local = build_backend(&VfsConfig::local(dir.path())).unwrap();
        assert_eq!(local.name(), "local");
        assert!(local.capabilities().real_path);
        assert_eq!(
            local.to_real_path("/a.txt").unwrap(),
            std::path::absolute(dir.path()).unwrap().join("a.txt")
        );
    }
}
