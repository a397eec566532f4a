//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
///
/// Every variant that concerns a location carries the virtual path the
/// caller passed in (or the resolved real path for sandbox failures).
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create, write or rename would replace a node of another kind.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Resolved path falls outside the sandbox root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The host does not provide the primitives this backend needs.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Optional operation not supported by this backend instance.
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// Underlying I/O failure that has no more specific kind.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Error kind, for exhaustive matching without inspecting payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VfsErrorKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    NotADirectory,
    IsADirectory,
    DirectoryNotEmpty,
    PathEscape,
    InvalidPath,
    Unavailable,
    Unsupported,
    Io,
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an Unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(backend: &'static str, operation: &'static str) -> Self {
        Self::Unsupported { backend, operation }
    }

    /// Convert an OS error into the shared taxonomy, keeping the path.
    ///
    /// Kinds without a dedicated variant stay wrapped in [`VfsError::Io`].
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            io::ErrorKind::NotADirectory => Self::NotADirectory(path),
            io::ErrorKind::IsADirectory => Self::IsADirectory(path),
            io::ErrorKind::DirectoryNotEmpty => Self::DirectoryNotEmpty(path),
            _ => Self::Io { path, source: err },
        }
    }

    /// The kind of this error.
    pub fn kind(&self) -> VfsErrorKind {
        match self {
            Self::NotFound(_) => VfsErrorKind::NotFound,
            Self::AlreadyExists(_) => VfsErrorKind::AlreadyExists,
            Self::PermissionDenied(_) => VfsErrorKind::PermissionDenied,
            Self::NotADirectory(_) => VfsErrorKind::NotADirectory,
            Self::IsADirectory(_) => VfsErrorKind::IsADirectory,
            Self::DirectoryNotEmpty(_) => VfsErrorKind::DirectoryNotEmpty,
            Self::PathEscapesRoot(_) => VfsErrorKind::PathEscape,
            Self::InvalidPath(_) => VfsErrorKind::InvalidPath,
            Self::Unavailable(_) => VfsErrorKind::Unavailable,
            Self::Unsupported { .. } => VfsErrorKind::Unsupported,
            Self::Io { .. } => VfsErrorKind::Io,
        }
    }

    /// Returns true if retrying can never succeed on this backend instance.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Unsupported { .. } | Self::Unavailable(_))
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        let msg = e.to_string();
        match e {
            VfsError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(_) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::PermissionDenied(_) | VfsError::PathEscapesRoot(_) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::NotADirectory(_) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(_) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::DirectoryNotEmpty(_) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            VfsError::InvalidPath(_) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::Unavailable(_) | VfsError::Unsupported { .. } => {
                io::Error::new(io::ErrorKind::Unsupported, msg)
            }
            VfsError::Io { source, .. } => source,
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
