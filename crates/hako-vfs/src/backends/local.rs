//! Local filesystem backend.
//!
//! Provides access to real filesystem paths, with path security to keep
//! every resolved path inside the sandbox root. Line reads stream from disk
//! instead of loading whole files.

use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};

use crate::error::{VfsError, VfsResult};
use crate::host;
use crate::lines;
use crate::ops::VfsOps;
use crate::sandbox::Sandbox;
use crate::types::{Capabilities, FileStat, FileType};

/// Default size of the window read from the end of a file by
/// `read_last_lines`.
pub const DEFAULT_TAIL_WINDOW: usize = 64 * 1024;

const COUNT_CHUNK: usize = 64 * 1024;

/// Suffix counter for temp files of atomic writes.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local filesystem backend.
///
/// Virtual paths are relative to the sandbox root: with a root of
/// `/home/amy/project`, `read_file("/src/main.rs")` reads
/// `/home/amy/project/src/main.rs`. A path that climbs out of the root,
/// lexically or through a symlink, fails with `PathEscapesRoot` before any
/// real I/O on it.
///
/// [`LocalBackend::unsandboxed`] drops the confinement and resolves against
/// the host root. That is for trusted callers only.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    sandbox: Sandbox,
    tail_window: usize,
    available: bool,
}

impl LocalBackend {
    /// Create a backend confined to `root`.
    ///
    /// The root is made absolute now; it does not have to exist yet. An
    /// empty root is the same as [`LocalBackend::unsandboxed`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let sandbox = Sandbox::new(root);
        tracing::debug!(root = ?sandbox.root(), "local backend");
        Self::with_sandbox(sandbox)
    }

    /// Create a backend without a sandbox root.
    pub fn unsandboxed() -> Self {
        tracing::debug!("local backend without sandbox");
        Self::with_sandbox(Sandbox::unrestricted())
    }

    fn with_sandbox(sandbox: Sandbox) -> Self {
        let available = host::real_fs_available();
        if !available {
            tracing::warn!("host has no real filesystem, local backend unavailable");
        }
        Self {
            sandbox,
            tail_window: DEFAULT_TAIL_WINDOW,
            available,
        }
    }

    /// Set the number of trailing bytes `read_last_lines` looks at.
    pub fn with_tail_window(mut self, bytes: usize) -> Self {
        self.tail_window = bytes.max(1);
        self
    }

    /// The sandbox root, `None` when unsandboxed.
    pub fn root(&self) -> Option<&Path> {
        self.sandbox.root()
    }

    /// Fold path segments into one confined real path.
    ///
    /// An absolute segment restarts from the sandbox root, a relative one is
    /// appended to what came before. No I/O.
    pub fn resolve(&self, parts: &[&str]) -> VfsResult<PathBuf> {
        self.sandbox.resolve_all(parts)
    }

    fn check_available(&self) -> VfsResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(VfsError::unavailable("host has no real filesystem"))
        }
    }

    /// Resolve, then make sure no symlink on the way leads out of the root.
    async fn real(&self, path: &str) -> VfsResult<PathBuf> {
        self.check_available()?;
        let real = self.sandbox.resolve(path)?;
        self.sandbox.check_links(&real).await?;
        Ok(real)
    }

    fn is_root(&self, real: &Path) -> bool {
        match self.sandbox.root() {
            Some(root) => real == root,
            None => real.parent().is_none(),
        }
    }

    /// Lines `[start, end)`, reading no further than line `end`.
    async fn stream_lines(&self, path: &str, start: usize, end: usize) -> VfsResult<String> {
        let real = self.real(path).await?;
        let file = fs::File::open(&real)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        let mut reader = BufReader::new(file).lines();

        let mut out = Vec::new();
        let mut index = 0;
        while index < end {
            let Some(line) = reader
                .next_line()
                .await
                .map_err(|e| VfsError::from_io(e, path))?
            else {
                break;
            };
            if index >= start {
                out.push(line);
            }
            index += 1;
        }
        Ok(out.join("\n"))
    }
}

/// Convert filesystem metadata to a `FileStat`.
fn metadata_to_stat(meta: &std::fs::Metadata) -> FileStat {
    let kind = if meta.is_dir() {
        FileType::Directory
    } else {
        FileType::File
    };
    let mtime = meta.modified().unwrap_or(UNIX_EPOCH);
    FileStat {
        size: if meta.is_dir() { 0 } else { meta.len() },
        kind,
        mtime,
        birthtime: meta.created().unwrap_or(mtime),
    }
}

async fn metadata(real: &Path, path: &str) -> VfsResult<std::fs::Metadata> {
    fs::metadata(real)
        .await
        .map_err(|e| VfsError::from_io(e, path))
}

/// Kind of whatever is at `real`, `None` if nothing is.
async fn existing_kind(real: &Path, path: &str) -> VfsResult<Option<FileType>> {
    match fs::metadata(real).await {
        Ok(meta) => Ok(Some(metadata_to_stat(&meta).kind)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(VfsError::from_io(e, path)),
    }
}

async fn ensure_parent(real: &Path, path: &str) -> VfsResult<()> {
    if let Some(parent) = real.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
    }
    Ok(())
}

/// Write `data` to a sibling temp file and rename it over `real`.
///
/// Readers see either the old content or the new, never a partial file.
async fn write_atomic(real: &Path, data: &[u8], path: &str) -> VfsResult<()> {
    let (Some(parent), Some(name)) = (real.parent(), real.file_name()) else {
        return Err(VfsError::is_a_directory(path));
    };
    let temp = parent.join(format!(
        ".{}.{}-{}.tmp",
        name.to_string_lossy(),
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    if let Err(e) = fs::write(&temp, data).await {
        let _ = fs::remove_file(&temp).await;
        return Err(VfsError::from_io(e, path));
    }
    if let Err(e) = fs::rename(&temp, real).await {
        let _ = fs::remove_file(&temp).await;
        return Err(VfsError::from_io(e, path));
    }
    Ok(())
}

fn invalid_utf8(err: impl std::error::Error + Send + Sync + 'static, path: &str) -> VfsError {
    VfsError::from_io(io::Error::new(io::ErrorKind::InvalidData, err), path)
}

#[async_trait]
impl VfsOps for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            real_path: true,
            binary: true,
            watch: false,
            streaming: true,
            advanced_streaming: true,
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn read_file(&self, path: &str) -> VfsResult<String> {
        let real = self.real(path).await?;
        fs::read_to_string(&real)
            .await
            .map_err(|e| VfsError::from_io(e, path))
    }

    async fn exists(&self, path: &str) -> VfsResult<bool> {
        let real = self.real(path).await?;
        match fs::metadata(&real).await {
            Ok(_) => Ok(true),
            // A file in the middle of the path means nothing is there.
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(VfsError::from_io(e, path)),
        }
    }

    async fn stat(&self, path: &str) -> VfsResult<FileStat> {
        let real = self.real(path).await?;
        Ok(metadata_to_stat(&metadata(&real, path).await?))
    }

    async fn readdir(&self, path: &str) -> VfsResult<Vec<String>> {
        let real = self.real(path).await?;
        let mut dir = fs::read_dir(&real)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| VfsError::from_io(e, path))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn read_lines(&self, path: &str, start: usize, end: usize) -> VfsResult<String> {
        self.stream_lines(path, start, end).await
    }

    async fn read_first_lines(&self, path: &str, n: usize) -> VfsResult<String> {
        self.stream_lines(path, 0, n).await
    }

    /// Reads at most the last `tail_window` bytes. Lines are only taken
    /// from inside that window, so a tail request reaching further back
    /// returns fewer lines.
    async fn read_last_lines(&self, path: &str, n: usize) -> VfsResult<String> {
        let real = self.real(path).await?;
        let mut file = fs::File::open(&real)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| VfsError::from_io(e, path))?
            .len();

        // Start one byte early so a window that begins exactly on a line
        // start is recognizable.
        let window = (self.tail_window as u64).min(len);
        let offset = (len - window).saturating_sub(1);
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        let mut buf = Vec::with_capacity((len - offset) as usize);
        file.read_to_end(&mut buf)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;

        let body = if offset == 0 && window == len {
            &buf[..]
        } else {
            match buf.iter().position(|b| *b == b'\n') {
                Some(pos) => &buf[pos + 1..],
                // One line longer than the window: keep its tail, starting
                // on a character boundary.
                None => {
                    let skip = buf.iter().take_while(|b| (**b & 0xC0) == 0x80).count();
                    &buf[skip..]
                }
            }
        };
        let text = std::str::from_utf8(body).map_err(|e| invalid_utf8(e, path))?;
        Ok(lines::last(text, n))
    }

    async fn count_lines(&self, path: &str) -> VfsResult<usize> {
        let real = self.real(path).await?;
        let mut file = fs::File::open(&real)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;

        let mut buf = vec![0u8; COUNT_CHUNK];
        let mut newlines = 0;
        let mut last = None;
        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| VfsError::from_io(e, path))?;
            if n == 0 {
                break;
            }
            newlines += buf[..n].iter().filter(|b| **b == b'\n').count();
            last = Some(buf[n - 1]);
        }
        Ok(match last {
            None => 0,
            Some(b'\n') => newlines,
            Some(_) => newlines + 1,
        })
    }

    #[tracing::instrument(level = "debug", skip(self, content), fields(len = content.len()))]
    async fn write_file(&self, path: &str, content: &str) -> VfsResult<()> {
        self.write_file_buffer(path, content.as_bytes()).await
    }

    #[tracing::instrument(level = "debug", skip(self, content), fields(len = content.len()))]
    async fn append_file(&self, path: &str, content: &str) -> VfsResult<()> {
        let real = self.real(path).await?;
        if existing_kind(&real, path).await? == Some(FileType::Directory) {
            return Err(VfsError::is_a_directory(path));
        }
        ensure_parent(&real, path).await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&real)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        file.flush().await.map_err(|e| VfsError::from_io(e, path))
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        let real = self.real(path).await?;
        fs::create_dir_all(&real)
            .await
            .map_err(|e| VfsError::from_io(e, path))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn unlink(&self, path: &str) -> VfsResult<()> {
        let real = self.real(path).await?;
        if metadata(&real, path).await?.is_dir() {
            return Err(VfsError::is_a_directory(path));
        }
        fs::remove_file(&real)
            .await
            .map_err(|e| VfsError::from_io(e, path))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn rmdir(&self, path: &str) -> VfsResult<()> {
        let real = self.real(path).await?;
        if self.is_root(&real) {
            return Err(VfsError::permission_denied("cannot remove root"));
        }
        if !metadata(&real, path).await?.is_dir() {
            return Err(VfsError::not_a_directory(path));
        }
        fs::remove_dir(&real)
            .await
            .map_err(|e| VfsError::from_io(e, path))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn copy_file(&self, src: &str, dest: &str) -> VfsResult<()> {
        let from = self.real(src).await?;
        let to = self.real(dest).await?;
        if metadata(&from, src).await?.is_dir() {
            return Err(VfsError::is_a_directory(src));
        }
        if existing_kind(&to, dest).await? == Some(FileType::Directory) {
            return Err(VfsError::is_a_directory(dest));
        }
        // Read fully before touching `dest`: it may be `src` itself.
        let data = fs::read(&from)
            .await
            .map_err(|e| VfsError::from_io(e, src))?;
        ensure_parent(&to, dest).await?;
        write_atomic(&to, &data, dest).await
    }

    /// Replacing a non-empty directory fails with `DirectoryNotEmpty`, as
    /// the OS rename does.
    #[tracing::instrument(level = "debug", skip(self))]
    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let from_real = self.real(from).await?;
        let to_real = self.real(to).await?;
        if self.is_root(&from_real) || self.is_root(&to_real) {
            return Err(VfsError::permission_denied("cannot move the root"));
        }

        let src_kind = metadata_to_stat(&metadata(&from_real, from).await?).kind;
        if from_real == to_real {
            return Ok(());
        }
        if to_real.starts_with(&from_real) {
            return Err(VfsError::invalid_path(format!(
                "cannot move {} into itself ({})",
                from, to
            )));
        }
        if let Some(dest_kind) = existing_kind(&to_real, to).await? {
            if dest_kind != src_kind {
                return Err(VfsError::already_exists(to));
            }
        }

        ensure_parent(&to_real, to).await?;
        fs::rename(&from_real, &to_real)
            .await
            .map_err(|e| VfsError::from_io(e, to))
    }

    async fn materialize(&self, path: &str, _target_dir: Option<&Path>) -> VfsResult<PathBuf> {
        let real = self.real(path).await?;
        if metadata(&real, path).await?.is_dir() {
            return Err(VfsError::is_a_directory(path));
        }
        Ok(real)
    }

    async fn read_file_buffer(&self, path: &str) -> VfsResult<Vec<u8>> {
        let real = self.real(path).await?;
        fs::read(&real).await.map_err(|e| VfsError::from_io(e, path))
    }

    #[tracing::instrument(level = "debug", skip(self, data), fields(len = data.len()))]
    async fn write_file_buffer(&self, path: &str, data: &[u8]) -> VfsResult<()> {
        let real = self.real(path).await?;
        if existing_kind(&real, path).await? == Some(FileType::Directory) {
            return Err(VfsError::is_a_directory(path));
        }
        ensure_parent(&real, path).await?;
        write_atomic(&real, data, path).await
    }

    async fn read_file_bytes(&self, path: &str, start: u64, length: usize) -> VfsResult<Vec<u8>> {
        let real = self.real(path).await?;
        let mut file = fs::File::open(&real)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| VfsError::from_io(e, path))?;

        let mut buffer = Vec::with_capacity(length.min(COUNT_CHUNK));
        file.take(length as u64)
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        Ok(buffer)
    }

    fn to_real_path(&self, path: &str) -> VfsResult<PathBuf> {
        self.check_available()?;
        self.sandbox.resolve(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VfsErrorKind;
    use tempfile::TempDir;

    fn setup() -> (LocalBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path());
        (backend, dir)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (backend, dir) = setup();
        backend.write_file("/test.txt", "hello world").await.unwrap();

        assert_eq!(backend.read_file("/test.txt").await.unwrap(), "hello world");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("test.txt")).unwrap(),
            "hello world"
        );
    }

    #[tokio::test]
    async fn test_write_creates_parents() {
        let (backend, dir) = setup();
        backend.write_file("/a/b/c.txt", "x").await.unwrap();
        assert!(dir.path().join("a/b").is_dir());
        assert!(backend.stat("/a/b").await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let (backend, dir) = setup();
        backend.write_file("/f.txt", "one").await.unwrap();
        backend.write_file("/f.txt", "two").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["f.txt"]);
        assert_eq!(backend.read_file("/f.txt").await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_write_over_directory_fails() {
        let (backend, _dir) = setup();
        backend.mkdir("/d").await.unwrap();
        let err = backend.write_file("/d", "x").await.unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::IsADirectory);
    }

    #[tokio::test]
    async fn test_append_creates_and_extends() {
        let (backend, _dir) = setup();
        backend.append_file("/logs/app.log", "one\n").await.unwrap();
        backend.append_file("/logs/app.log", "two\n").await.unwrap();
        assert_eq!(backend.read_file("/logs/app.log").await.unwrap(), "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_path_escape_blocked() {
        let (backend, dir) = setup();
        let name = format!("{}-escape.txt", dir.path().file_name().unwrap().to_string_lossy());

        let err = backend
            .write_file(&format!("/../{name}"), "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::PathEscape);
        assert!(!dir.path().parent().unwrap().join(&name).exists());

        let err = backend.read_file("../../../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::PathEscape);
    }

    #[tokio::test]
    async fn test_real_path_input_is_accepted() {
        let (backend, dir) = setup();
        backend.write_file("/x.txt", "x").await.unwrap();
        let real = dir.path().join("x.txt");
        assert_eq!(
            backend.read_file(&real.to_string_lossy()).await.unwrap(),
            "x"
        );
    }

    #[tokio::test]
    async fn test_stat() {
        let (backend, _dir) = setup();
        backend.write_file("/d/f.txt", "12345").await.unwrap();
        let stat = backend.stat("/d/f.txt").await.unwrap();
        assert!(stat.is_file());
        assert_eq!(stat.size, 5);
        assert_eq!(backend.stat("/d").await.unwrap().size, 0);
        assert_eq!(
            backend.stat("/nope").await.unwrap_err().kind(),
            VfsErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_mkdir_and_readdir() {
        let (backend, _dir) = setup();
        backend.mkdir("/subdir").await.unwrap();
        backend.write_file("/subdir/file.txt", "").await.unwrap();
        backend.write_file("/root.txt", "").await.unwrap();

        assert_eq!(backend.readdir("/").await.unwrap(), vec!["root.txt", "subdir"]);
        assert_eq!(
            backend.readdir("/root.txt").await.unwrap_err().kind(),
            VfsErrorKind::NotADirectory
        );
    }

    #[tokio::test]
    async fn test_mkdir_over_file_fails() {
        let (backend, _dir) = setup();
        backend.write_file("/a/c", "x").await.unwrap();
        assert!(backend.mkdir("/a/c").await.is_err());
        assert_eq!(
            backend.mkdir("/a/c/d").await.unwrap_err().kind(),
            VfsErrorKind::NotADirectory
        );
    }

    #[tokio::test]
    async fn test_unlink_and_rmdir() {
        let (backend, _dir) = setup();
        backend.write_file("/full/f", "x").await.unwrap();

        assert_eq!(
            backend.unlink("/full").await.unwrap_err().kind(),
            VfsErrorKind::IsADirectory
        );
        assert_eq!(
            backend.rmdir("/full").await.unwrap_err().kind(),
            VfsErrorKind::DirectoryNotEmpty
        );
        assert_eq!(
            backend.rmdir("/full/f").await.unwrap_err().kind(),
            VfsErrorKind::NotADirectory
        );
        assert_eq!(
            backend.rmdir("/").await.unwrap_err().kind(),
            VfsErrorKind::PermissionDenied
        );

        backend.unlink("/full/f").await.unwrap();
        backend.rmdir("/full").await.unwrap();
        assert!(!backend.exists("/full").await.unwrap());
    }

    #[tokio::test]
    async fn test_rename() {
        let (backend, _dir) = setup();
        backend.write_file("/a/x", "1").await.unwrap();
        backend.rename("/a", "/moved/b").await.unwrap();
        assert!(!backend.exists("/a").await.unwrap());
        assert_eq!(backend.read_file("/moved/b/x").await.unwrap(), "1");

        backend.write_file("/f", "x").await.unwrap();
        let err = backend.rename("/f", "/moved/b").await.unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::AlreadyExists);
        let err = backend.rename("/moved", "/moved/b/inner").await.unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::InvalidPath);
        assert_eq!(backend.read_file("/f").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_copy_file() {
        let (backend, _dir) = setup();
        backend.write_file("/a.txt", "x").await.unwrap();
        backend.copy_file("/a.txt", "/b/c.txt").await.unwrap();
        assert_eq!(backend.read_file("/b/c.txt").await.unwrap(), "x");
        assert_eq!(
            backend.copy_file("/b", "/z").await.unwrap_err().kind(),
            VfsErrorKind::IsADirectory
        );
    }

    #[tokio::test]
    async fn test_copy_onto_itself_keeps_content() {
        let (backend, dir) = setup();
        backend.write_file("/a.txt", "precious").await.unwrap();
        backend.copy_file("/a.txt", "/a.txt").await.unwrap();
        assert_eq!(backend.read_file("/a.txt").await.unwrap(), "precious");

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_exists_below_a_file_is_false() {
        let (backend, _dir) = setup();
        backend.write_file("/f", "x").await.unwrap();
        assert!(!backend.exists("/f/x").await.unwrap());
        assert!(!backend.exists("/missing/x").await.unwrap());
        assert!(backend.exists("/f").await.unwrap());
    }

    #[tokio::test]
    async fn test_streaming_lines() {
        let (backend, _dir) = setup();
        backend.write_file("/a.txt", "one\r\ntwo\nthree\n").await.unwrap();

        assert_eq!(backend.read_lines("/a.txt", 1, 3).await.unwrap(), "two\nthree");
        assert_eq!(backend.read_first_lines("/a.txt", 2).await.unwrap(), "one\ntwo");
        assert_eq!(backend.read_last_lines("/a.txt", 2).await.unwrap(), "two\nthree");
        assert_eq!(backend.count_lines("/a.txt").await.unwrap(), 3);

        backend.write_file("/empty.txt", "").await.unwrap();
        assert_eq!(backend.count_lines("/empty.txt").await.unwrap(), 0);
        assert_eq!(backend.read_last_lines("/empty.txt", 3).await.unwrap(), "");

        backend.write_file("/open.txt", "a\nb").await.unwrap();
        assert_eq!(backend.count_lines("/open.txt").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_tail_window_bounds_last_lines() {
        let (backend, _dir) = setup();
        let backend = backend.with_tail_window(32);
        let content: String = (0..100).map(|i| format!("line-{i}\n")).collect();
        backend.write_file("/big.txt", &content).await.unwrap();

        assert_eq!(
            backend.read_last_lines("/big.txt", 3).await.unwrap(),
            "line-97\nline-98\nline-99"
        );
        // only whole lines inside the last 32 bytes are visible
        assert_eq!(
            backend.read_last_lines("/big.txt", 10).await.unwrap(),
            "line-96\nline-97\nline-98\nline-99"
        );
    }

    #[tokio::test]
    async fn test_binary_and_positioned_reads() {
        let (backend, _dir) = setup();
        let data = [0u8, 159, 146, 150, 255, 10];
        backend.write_file_buffer("/bin/blob", &data).await.unwrap();

        assert_eq!(backend.read_file_buffer("/bin/blob").await.unwrap(), data);
        assert_eq!(
            backend.read_file_bytes("/bin/blob", 1, 3).await.unwrap(),
            &data[1..4]
        );
        assert_eq!(
            backend.read_file_bytes("/bin/blob", 4, 100).await.unwrap(),
            &data[4..]
        );
        assert!(backend.read_file_bytes("/bin/blob", 50, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_real_paths() {
        let (backend, dir) = setup();
        let root = backend.root().unwrap().to_path_buf();

        // no I/O: the file does not exist
        let real = backend.to_real_path("/docs/new.md").unwrap();
        assert_eq!(real, root.join("docs/new.md"));
        assert!(backend.to_real_path("/../x").is_err());

        backend.write_file("/docs/new.md", "# New").await.unwrap();
        let materialized = backend.materialize("/docs/new.md", None).await.unwrap();
        assert_eq!(materialized, real);
        assert!(materialized.starts_with(dir.path()) || materialized.starts_with(&root));
    }

    #[tokio::test]
    async fn test_resolve_fold() {
        let (backend, _dir) = setup();
        let root = backend.root().unwrap().to_path_buf();
        assert_eq!(backend.resolve(&["/a", "b"]).unwrap(), root.join("a/b"));
        assert_eq!(backend.resolve(&["/a", "/x"]).unwrap(), root.join("x"));
        assert!(backend.resolve(&["/a", "../../.."]).is_err());
    }

    #[tokio::test]
    async fn test_unsandboxed() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::unsandboxed();
        assert!(backend.root().is_none());

        let file = dir.path().join("plain.txt");
        let virtual_path = file.to_string_lossy().into_owned();
        backend.write_file(&virtual_path, "free").await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "free");
        assert_eq!(backend.to_real_path(&virtual_path).unwrap(), file);
    }

    #[tokio::test]
    async fn test_write_updates_mtime() {
        let (backend, dir) = setup();
        backend.write_file("/m.txt", "a").await.unwrap();
        let before = std::fs::metadata(dir.path().join("m.txt")).unwrap().modified().unwrap();
        backend.append_file("/m.txt", "b").await.unwrap();
        let after = backend.stat("/m.txt").await.unwrap().mtime;
        assert!(after >= before);
    }

    #[test]
    fn test_capabilities() {
        let backend = LocalBackend::unsandboxed();
        let caps = backend.capabilities();
        assert!(caps.real_path && caps.binary && caps.streaming && caps.advanced_streaming);
        assert!(!caps.watch);
        assert!(backend.is_available());
    }
}
