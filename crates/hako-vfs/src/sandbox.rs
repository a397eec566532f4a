//! Sandbox root resolution for the disk backend.
//!
//! A virtual path is resolved against the sandbox root in three steps:
//!
//! 1. A path that already starts with the root's text is taken as a real
//!    path (this is what [`Sandbox::resolve`] hands back, so results can be
//!    fed in again). Any other leading separator means "relative to the
//!    root", not to the host's `/`.
//! 2. The candidate is joined onto the root and normalized lexically.
//!    `..` is applied to the joined path, so it can climb out of the root.
//! 3. The result must be the root or lie below it, compared component by
//!    component (`/root-evil` is not below `/root`).
//!
//! Step 3 failing is [`VfsError::PathEscapesRoot`]. Resolution performs no
//! I/O; [`Sandbox::check_links`] is the separate I/O-backed pass that stops
//! symlinks inside the root from pointing out of it.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{VfsError, VfsResult};

/// Root confinement for real paths.
#[derive(Debug, Clone)]
pub struct Sandbox {
    /// Absolute, lexically normalized root. `None` disables confinement.
    root: Option<PathBuf>,
    /// Root with symlinks resolved, for [`Sandbox::check_links`].
    canonical_root: Option<PathBuf>,
}

impl Sandbox {
    /// Confine paths to `root`.
    ///
    /// A relative root is made absolute against the current directory. An
    /// empty root means no confinement, as with [`Sandbox::unrestricted`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        if root.as_os_str().is_empty() {
            return Self::unrestricted();
        }
        let root = std::path::absolute(&root).unwrap_or(root);
        let root = normalize_real(&root);
        let canonical_root = dunce::canonicalize(&root).unwrap_or_else(|_| root.clone());
        Self {
            root: Some(root),
            canonical_root: Some(canonical_root),
        }
    }

    /// No confinement: virtual paths resolve against the host root.
    pub fn unrestricted() -> Self {
        Self {
            root: None,
            canonical_root: None,
        }
    }

    /// The sandbox root, if confinement is enabled.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn base(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("/"))
    }

    /// Resolve one virtual path to a confined real path.
    pub fn resolve(&self, path: &str) -> VfsResult<PathBuf> {
        self.resolve_all([path])
    }

    /// Fold several segments into one confined real path.
    ///
    /// An absolute segment resets the accumulator to the sandbox root (plus
    /// that segment); a relative segment is appended to the accumulator.
    /// Only the final result is checked against the root.
    pub fn resolve_all<I, S>(&self, parts: I) -> VfsResult<PathBuf>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let base = self.base();
        let root_text = self.root.as_ref().map(|r| slashed(&r.to_string_lossy()));
        let mut acc = base.clone();
        let mut shown = String::new();

        for part in parts {
            let part = slashed(part.as_ref());
            if part.is_empty() {
                continue;
            }
            if !shown.is_empty() {
                shown.push_str(", ");
            }
            shown.push_str(&part);

            if root_text.as_deref().is_some_and(|root| part.starts_with(root)) {
                acc = PathBuf::from(&part);
            } else if part.starts_with('/') {
                acc = base.join(part.trim_start_matches('/'));
            } else {
                acc.push(&part);
            }
        }

        let real = normalize_real(&acc);
        if let Some(root) = &self.root {
            if !is_within(root, &real) {
                tracing::warn!(
                    path = %shown,
                    root = %root.display(),
                    "rejected path outside sandbox"
                );
                return Err(VfsError::path_escapes_root(format!(
                    "{} is not under {}",
                    real.display(),
                    root.display()
                )));
            }
        }
        Ok(real)
    }

    /// Verify that following symlinks from `real` stays inside the root.
    ///
    /// Canonicalizes the deepest existing ancestor of `real` (which must be
    /// the output of [`Sandbox::resolve`]) and re-checks containment.
    pub async fn check_links(&self, real: &Path) -> VfsResult<()> {
        let (Some(root), Some(canonical_root)) = (&self.root, &self.canonical_root) else {
            return Ok(());
        };

        let mut probe = real.to_path_buf();
        loop {
            if !is_within(root, &probe) {
                return Ok(());
            }
            if tokio::fs::symlink_metadata(&probe).await.is_ok() {
                break;
            }
            if !probe.pop() {
                return Ok(());
            }
        }

        let target = probe.clone();
        let canonical = tokio::task::spawn_blocking(move || dunce::canonicalize(&target))
            .await
            .map_err(|e| VfsError::Io {
                path: probe.display().to_string(),
                source: io::Error::other(e),
            })?
            .map_err(|e| VfsError::from_io(e, probe.display().to_string()))?;

        if is_within(canonical_root, &canonical) {
            Ok(())
        } else {
            tracing::warn!(
                path = %real.display(),
                target = %canonical.display(),
                "symlink leads outside sandbox"
            );
            Err(VfsError::path_escapes_root(format!(
                "{} resolves to {}",
                real.display(),
                canonical.display()
            )))
        }
    }
}

/// True when `candidate` is `root` or below it, compared by component.
pub fn is_within(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

/// Lexically normalize a real path: drop `.`, apply `..`, keep the prefix
/// and root. `..` at the host root stays at the host root.
pub fn normalize_real(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(s) => out.push(s),
        }
    }
    out
}

fn slashed(s: &str) -> String {
    s.replace('\\', "/")
}
