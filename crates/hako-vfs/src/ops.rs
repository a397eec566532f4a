//! VFS operations trait.
//!
//! Calling code is written against [`VfsOps`] and never needs to know which
//! backend it holds. Paths are virtual path strings; each backend resolves
//! them itself.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::error::{VfsError, VfsResult};
use super::types::{Capabilities, FileStat};

/// Core VFS operations trait.
///
/// The required methods form the contract every backend satisfies. The
/// binary and real-path methods at the bottom are optional: their default
/// implementations fail with [`VfsError::Unsupported`], and the matching
/// [`Capabilities`] flag tells callers up front whether they work.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Introspection
    // ========================================================================

    /// Short backend name, used in error messages.
    fn name(&self) -> &'static str;

    /// Optional operations supported by this instance.
    fn capabilities(&self) -> Capabilities;

    /// False when the host lacks the primitives this backend needs. Every
    /// operation on an unavailable backend fails with `Unavailable`.
    fn is_available(&self) -> bool {
        true
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Read a whole file as text.
    async fn read_file(&self, path: &str) -> VfsResult<String>;

    /// Check whether anything exists at `path`.
    async fn exists(&self, path: &str) -> VfsResult<bool>;

    /// Get size, type and timestamps.
    async fn stat(&self, path: &str) -> VfsResult<FileStat>;

    /// Names of the entries in a directory, sorted.
    async fn readdir(&self, path: &str) -> VfsResult<Vec<String>>;

    /// Lines `[start, end)` joined with `\n`.
    async fn read_lines(&self, path: &str, start: usize, end: usize) -> VfsResult<String>;

    /// The first `n` lines.
    async fn read_first_lines(&self, path: &str, n: usize) -> VfsResult<String>;

    /// The last `n` lines.
    async fn read_last_lines(&self, path: &str, n: usize) -> VfsResult<String>;

    /// Number of lines in a file.
    async fn count_lines(&self, path: &str) -> VfsResult<usize>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Create or replace a file, creating missing parent directories.
    async fn write_file(&self, path: &str, content: &str) -> VfsResult<()>;

    /// Append to a file, creating it (and its parents) if missing.
    async fn append_file(&self, path: &str, content: &str) -> VfsResult<()>;

    /// Create a directory and any missing parents.
    async fn mkdir(&self, path: &str) -> VfsResult<()>;

    /// Remove a file. Directories are refused.
    async fn unlink(&self, path: &str) -> VfsResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &str) -> VfsResult<()>;

    /// Copy a file's content to `dest` with `write_file` semantics.
    async fn copy_file(&self, src: &str, dest: &str) -> VfsResult<()>;

    /// Move a file or directory (with its subtree).
    ///
    /// Replacing an existing destination of the same kind is allowed; a
    /// destination of the other kind fails with `AlreadyExists`.
    async fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    /// Make the file at `path` available as a real file and return its
    /// absolute host path.
    ///
    /// `target_dir` picks where a copy is written for backends that have to
    /// copy; backends whose files are already real ignore it.
    async fn materialize(&self, path: &str, target_dir: Option<&Path>) -> VfsResult<PathBuf>;

    // ========================================================================
    // Optional operations (see Capabilities)
    // ========================================================================

    /// Read a whole file as bytes. Requires `capabilities().binary`.
    async fn read_file_buffer(&self, path: &str) -> VfsResult<Vec<u8>> {
        let _ = path;
        Err(VfsError::unsupported(self.name(), "read_file_buffer"))
    }

    /// Create or replace a file with raw bytes. Requires `capabilities().binary`.
    async fn write_file_buffer(&self, path: &str, data: &[u8]) -> VfsResult<()> {
        let _ = (path, data);
        Err(VfsError::unsupported(self.name(), "write_file_buffer"))
    }

    /// Read up to `length` bytes starting at byte `start` without loading
    /// the whole file. Requires `capabilities().binary`.
    async fn read_file_bytes(&self, path: &str, start: u64, length: usize) -> VfsResult<Vec<u8>> {
        let _ = (path, start, length);
        Err(VfsError::unsupported(self.name(), "read_file_bytes"))
    }

    /// Map a virtual path to the real path it denotes, without I/O.
    /// Requires `capabilities().real_path`.
    fn to_real_path(&self, path: &str) -> VfsResult<PathBuf> {
        let _ = path;
        Err(VfsError::unsupported(self.name(), "to_real_path"))
    }
}
