//! Core VFS types.
//!
//! Only owned values cross the backend boundary: callers never get a
//! handle into a backend's storage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Result of `stat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStat {
    /// Content length in bytes for files, always 0 for directories.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Last content modification.
    pub mtime: SystemTime,
    /// Creation time. Falls back to `mtime` where the host does not record it.
    pub birthtime: SystemTime,
}

impl FileStat {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Which optional operations a backend instance supports.
///
/// Fixed for the lifetime of the instance. Check it before calling an
/// optional method of [`crate::VfsOps`]; an unsupported call fails with
/// [`crate::VfsError::Unsupported`] and will keep failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// `to_real_path` maps virtual paths onto real ones without copying.
    pub real_path: bool,
    /// `read_file_buffer`, `write_file_buffer` and `read_file_bytes`.
    pub binary: bool,
    /// Change notifications. No backend in this crate provides them.
    pub watch: bool,
    /// Line reads stream from storage instead of loading whole files.
    pub streaming: bool,
    /// Head, tail and line counting stay bounded on large files.
    pub advanced_streaming: bool,
}

/// Point-in-time export of an in-memory tree.
///
/// This is the interchange format for persisting a `MemoryBackend`: a flat
/// map of absolute path to file content plus the capture time in
/// milliseconds since the Unix epoch. Empty directories are listed
/// separately so restoring reproduces them; producers that omit the list
/// still restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub files: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directories: Vec<String>,
    pub timestamp: u64,
}

impl Snapshot {
    /// Create an empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            directories: Vec::new(),
            timestamp: epoch_millis(SystemTime::now()),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds since the Unix epoch, saturating at zero for earlier times.
pub(crate) fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
