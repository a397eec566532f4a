//! # hako-vfs
//!
//! Virtual filesystem for agent workspaces.
//!
//! One async contract, [`VfsOps`], with two interchangeable backends:
//!
//! - [`MemoryBackend`] - in-memory tree with snapshot/restore and an ASCII
//!   tree view, for scratch space and tests
//! - [`LocalBackend`] - real filesystem confined to a sandbox root, with
//!   streaming line reads and binary access
//!
//! Optional operations (binary payloads, real-path mapping) are announced
//! through [`Capabilities`]; check them before calling instead of catching
//! [`VfsError::Unsupported`].
//!
//! ## Design Decisions
//!
//! - **Virtual paths are strings**: `/` separated, always normalized by the
//!   backend. Use [`path`] for the pure helpers.
//! - **Owned values only**: nothing returned borrows from a backend.
//! - **Escape checks before I/O**: the disk backend rejects paths outside
//!   its root, lexically and through symlinks, before touching them.
//! - **No global instance**: build backends explicitly, or through
//!   [`build_backend`] from a [`VfsConfig`].

pub mod backends;
pub mod config;
mod error;
pub mod host;
pub mod lines;
mod ops;
pub mod path;
pub mod sandbox;
mod types;

pub use backends::{DEFAULT_TAIL_WINDOW, LocalBackend, MemoryBackend};
pub use config::{BackendKind, ConfigError, VfsConfig, build_backend};
pub use error::{VfsError, VfsErrorKind, VfsResult};
pub use ops::VfsOps;
pub use sandbox::Sandbox;
pub use types::{Capabilities, FileStat, FileType, Snapshot};
