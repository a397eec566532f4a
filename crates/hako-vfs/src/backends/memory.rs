//! In-memory filesystem backend.
//!
//! The tree is strictly owned: each directory owns its children by value
//! and nothing points back to a parent. Every operation re-walks from the
//! root with the path's segments, so a move or delete cannot leave a stale
//! reference behind.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::error::{VfsError, VfsResult};
use crate::host;
use crate::lines;
use crate::ops::VfsOps;
use crate::path;
use crate::types::{Capabilities, FileStat, FileType, Snapshot, epoch_millis};

/// Longest heading text shown next to a file in [`MemoryBackend::tree`].
const TREE_HEADING_MAX: usize = 40;

/// Distinguishes materialized files created within the same millisecond.
static MATERIALIZE_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
struct File {
    content: String,
    created: SystemTime,
    modified: SystemTime,
}

#[derive(Debug, Clone)]
struct Dir {
    children: BTreeMap<String, Node>,
    created: SystemTime,
    modified: SystemTime,
}

#[derive(Debug, Clone)]
enum Node {
    File(File),
    Dir(Dir),
}

impl File {
    fn new(content: String) -> Self {
        let now = SystemTime::now();
        Self {
            content,
            created: now,
            modified: now,
        }
    }
}

impl Node {
    fn kind(&self) -> FileType {
        match self {
            Node::File(_) => FileType::File,
            Node::Dir(_) => FileType::Directory,
        }
    }

    fn stat(&self) -> FileStat {
        match self {
            Node::File(f) => FileStat {
                size: f.content.len() as u64,
                kind: FileType::File,
                mtime: f.modified,
                birthtime: f.created,
            },
            Node::Dir(d) => d.stat(),
        }
    }
}

impl Dir {
    fn new() -> Self {
        let now = SystemTime::now();
        Self {
            children: BTreeMap::new(),
            created: now,
            modified: now,
        }
    }

    fn touch(&mut self) {
        self.modified = SystemTime::now();
    }

    fn stat(&self) -> FileStat {
        FileStat {
            size: 0,
            kind: FileType::Directory,
            mtime: self.modified,
            birthtime: self.created,
        }
    }

    // ------------------------------------------------------------------------
    // Walking
    // ------------------------------------------------------------------------

    /// Directory at `segs` (the root for none).
    fn dir(&self, segs: &[String], path: &str) -> VfsResult<&Dir> {
        let mut cur = self;
        for seg in segs {
            cur = match cur.children.get(seg) {
                Some(Node::Dir(d)) => d,
                Some(Node::File(_)) => return Err(VfsError::not_a_directory(path)),
                None => return Err(VfsError::not_found(path)),
            };
        }
        Ok(cur)
    }

    fn dir_mut(&mut self, segs: &[String], path: &str) -> VfsResult<&mut Dir> {
        let mut cur = self;
        for seg in segs {
            cur = match cur.children.get_mut(seg) {
                Some(Node::Dir(d)) => d,
                Some(Node::File(_)) => return Err(VfsError::not_a_directory(path)),
                None => return Err(VfsError::not_found(path)),
            };
        }
        Ok(cur)
    }

    /// Directory at `segs`, creating missing ones.
    ///
    /// Only existing segments can be files, and they all come before the
    /// first created one, so a failure never leaves new directories behind.
    fn ensure_dir(&mut self, segs: &[String], path: &str) -> VfsResult<&mut Dir> {
        let mut cur = self;
        for seg in segs {
            if !cur.children.contains_key(seg) {
                cur.touch();
            }
            cur = match cur
                .children
                .entry(seg.clone())
                .or_insert_with(|| Node::Dir(Dir::new()))
            {
                Node::Dir(d) => d,
                Node::File(_) => return Err(VfsError::not_a_directory(path)),
            };
        }
        Ok(cur)
    }

    /// Node at non-empty `segs`.
    fn node(&self, segs: &[String], path: &str) -> VfsResult<&Node> {
        let (name, parents) = segs
            .split_last()
            .ok_or_else(|| VfsError::invalid_path(path))?;
        self.dir(parents, path)?
            .children
            .get(name)
            .ok_or_else(|| VfsError::not_found(path))
    }

    /// Fails if an existing segment of `segs` is a file.
    fn check_traversable(&self, segs: &[String], path: &str) -> VfsResult<()> {
        let mut cur = self;
        for seg in segs {
            match cur.children.get(seg) {
                Some(Node::Dir(d)) => cur = d,
                Some(Node::File(_)) => return Err(VfsError::not_a_directory(path)),
                None => return Ok(()),
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Operations on normalized paths
    // ------------------------------------------------------------------------

    fn read_file(&self, path: &str) -> VfsResult<String> {
        let segs = path::segments(path);
        if segs.is_empty() {
            return Err(VfsError::is_a_directory(path));
        }
        match self.node(&segs, path)? {
            Node::File(f) => Ok(f.content.clone()),
            Node::Dir(_) => Err(VfsError::is_a_directory(path)),
        }
    }

    fn write_file(&mut self, path: &str, content: &str, append: bool) -> VfsResult<()> {
        let segs = path::segments(path);
        let Some((name, parents)) = segs.split_last() else {
            return Err(VfsError::is_a_directory(path));
        };
        let dir = self.ensure_dir(parents, path)?;
        match dir.children.get_mut(name) {
            Some(Node::Dir(_)) => Err(VfsError::is_a_directory(path)),
            Some(Node::File(f)) => {
                if append {
                    f.content.push_str(content);
                } else {
                    f.content = content.to_string();
                }
                f.modified = SystemTime::now();
                Ok(())
            }
            None => {
                dir.children
                    .insert(name.clone(), Node::File(File::new(content.to_string())));
                dir.touch();
                Ok(())
            }
        }
    }

    fn mkdir(&mut self, path: &str) -> VfsResult<()> {
        let segs = path::segments(path);
        let Some((name, parents)) = segs.split_last() else {
            return Ok(());
        };
        if let Ok(Node::File(_)) = self.node(&segs, path) {
            return Err(VfsError::already_exists(path));
        }
        let dir = self.ensure_dir(parents, path)?;
        if !dir.children.contains_key(name) {
            dir.children.insert(name.clone(), Node::Dir(Dir::new()));
            dir.touch();
        }
        Ok(())
    }

    fn unlink(&mut self, path: &str) -> VfsResult<()> {
        let segs = path::segments(path);
        let Some((name, parents)) = segs.split_last() else {
            return Err(VfsError::is_a_directory(path));
        };
        let dir = self.dir_mut(parents, path)?;
        match dir.children.get(name) {
            None => Err(VfsError::not_found(path)),
            Some(Node::Dir(_)) => Err(VfsError::is_a_directory(path)),
            Some(Node::File(_)) => {
                dir.children.remove(name);
                dir.touch();
                Ok(())
            }
        }
    }

    fn rmdir(&mut self, path: &str) -> VfsResult<()> {
        let segs = path::segments(path);
        let Some((name, parents)) = segs.split_last() else {
            return Err(VfsError::permission_denied("cannot remove root"));
        };
        let dir = self.dir_mut(parents, path)?;
        match dir.children.get(name) {
            None => Err(VfsError::not_found(path)),
            Some(Node::File(_)) => Err(VfsError::not_a_directory(path)),
            Some(Node::Dir(d)) if !d.children.is_empty() => {
                Err(VfsError::directory_not_empty(path))
            }
            Some(Node::Dir(_)) => {
                dir.children.remove(name);
                dir.touch();
                Ok(())
            }
        }
    }

    fn rename(&mut self, from: &str, to: &str) -> VfsResult<()> {
        let from_segs = path::segments(from);
        let to_segs = path::segments(to);
        let (Some((from_name, from_parents)), Some((to_name, to_parents))) =
            (from_segs.split_last(), to_segs.split_last())
        else {
            return Err(VfsError::permission_denied("cannot move the root"));
        };

        // Validate everything before detaching the source.
        let src_kind = self.node(&from_segs, from)?.kind();
        if from_segs == to_segs {
            return Ok(());
        }
        if to_segs.starts_with(&from_segs) {
            return Err(VfsError::invalid_path(format!(
                "cannot move {} into itself ({})",
                from, to
            )));
        }
        self.check_traversable(to_parents, to)?;
        if let Ok(dest) = self.node(&to_segs, to) {
            if dest.kind() != src_kind {
                return Err(VfsError::already_exists(to));
            }
        }

        let source_dir = self.dir_mut(from_parents, from)?;
        let Some(node) = source_dir.children.remove(from_name) else {
            return Err(VfsError::not_found(from));
        };
        source_dir.touch();

        match self.ensure_dir(to_parents, to) {
            Ok(dest_dir) => {
                dest_dir.children.insert(to_name.clone(), node);
                dest_dir.touch();
                Ok(())
            }
            Err(e) => {
                if let Ok(source_dir) = self.dir_mut(from_parents, from) {
                    source_dir.children.insert(from_name.clone(), node);
                }
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Whole-tree views
    // ------------------------------------------------------------------------

    fn collect(&self, prefix: &str, snapshot: &mut Snapshot) {
        if self.children.is_empty() && prefix != path::ROOT {
            snapshot.directories.push(prefix.to_string());
        }
        for (name, node) in &self.children {
            let child = path::join([prefix, name.as_str()]);
            match node {
                Node::File(f) => {
                    snapshot.files.insert(child, f.content.clone());
                }
                Node::Dir(d) => d.collect(&child, snapshot),
            }
        }
    }

    fn render(&self, prefix: &str, depth: usize, max_depth: usize, out: &mut String) {
        let count = self.children.len();
        for (i, (name, node)) in self.children.iter().enumerate() {
            let last = i + 1 == count;
            let connector = if last { "└── " } else { "├── " };
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });

            out.push_str(prefix);
            out.push_str(connector);
            out.push_str(name);
            match node {
                Node::File(f) => {
                    if let Some(heading) = heading_comment(&f.content) {
                        out.push_str("  # ");
                        out.push_str(&heading);
                    }
                    out.push('\n');
                }
                Node::Dir(d) => {
                    out.push_str("/\n");
                    if depth < max_depth {
                        d.render(&child_prefix, depth + 1, max_depth, out);
                    } else if !d.children.is_empty() {
                        out.push_str(&child_prefix);
                        out.push_str("└── …\n");
                    }
                }
            }
        }
    }
}

/// Text of a Markdown-style heading on the first line, shortened.
fn heading_comment(content: &str) -> Option<String> {
    let first = content.lines().next()?.trim();
    if !first.starts_with('#') {
        return None;
    }
    let text = first.trim_start_matches('#').trim();
    if text.is_empty() {
        return None;
    }
    let mut short: String = text.chars().take(TREE_HEADING_MAX).collect();
    if text.chars().count() > TREE_HEADING_MAX {
        short.push('…');
    }
    Some(short)
}

/// In-memory filesystem backend.
///
/// The whole tree sits behind one `RwLock`: operations are atomic with
/// respect to each other, and the lock is never held across an await.
#[derive(Debug)]
pub struct MemoryBackend {
    root: RwLock<Dir>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Dir::new()),
        }
    }

    /// Export every file (and every empty directory) with its content.
    pub async fn create_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        self.root.read().collect(path::ROOT, &mut snapshot);
        snapshot
    }

    /// Replace the whole tree with the content of `snapshot`.
    ///
    /// Entries are replayed through the normal write path into a fresh tree,
    /// which is swapped in only if every entry applied.
    #[tracing::instrument(level = "debug", skip_all, fields(files = snapshot.files.len()))]
    pub async fn restore_snapshot(&self, snapshot: &Snapshot) -> VfsResult<()> {
        let mut fresh = Dir::new();
        for dir in &snapshot.directories {
            fresh.mkdir(&path::normalize(dir))?;
        }
        for (file, content) in &snapshot.files {
            fresh.write_file(&path::normalize(file), content, false)?;
        }
        *self.root.write() = fresh;
        Ok(())
    }

    /// Render the hierarchy as an ASCII tree, `max_depth` levels deep.
    ///
    /// ```text
    /// /
    /// ├── docs/
    /// │   └── readme.md  # Title
    /// └── todo.txt
    /// ```
    ///
    /// Files whose first line is a Markdown heading get its text as a
    /// trailing comment. Directories cut off by the depth limit show `…`.
    pub async fn tree(&self, max_depth: usize) -> String {
        let mut out = String::from("/\n");
        let root = self.root.read();
        if max_depth > 0 {
            root.render("", 1, max_depth, &mut out);
        } else if !root.children.is_empty() {
            out.push_str("└── …\n");
        }
        out
    }
}

#[async_trait]
impl VfsOps for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn read_file(&self, path: &str) -> VfsResult<String> {
        self.root.read().read_file(&path::normalize(path))
    }

    async fn exists(&self, path: &str) -> VfsResult<bool> {
        let segs = path::segments(path);
        Ok(segs.is_empty() || self.root.read().node(&segs, path).is_ok())
    }

    async fn stat(&self, path: &str) -> VfsResult<FileStat> {
        let normalized = path::normalize(path);
        let segs = path::segments(&normalized);
        let root = self.root.read();
        if segs.is_empty() {
            return Ok(root.stat());
        }
        root.node(&segs, &normalized).map(Node::stat)
    }

    async fn readdir(&self, path: &str) -> VfsResult<Vec<String>> {
        let normalized = path::normalize(path);
        let segs = path::segments(&normalized);
        let root = self.root.read();
        let dir = root.dir(&segs, &normalized)?;
        Ok(dir.children.keys().cloned().collect())
    }

    async fn read_lines(&self, path: &str, start: usize, end: usize) -> VfsResult<String> {
        let content = self.read_file(path).await?;
        Ok(lines::slice(&content, start, end))
    }

    async fn read_first_lines(&self, path: &str, n: usize) -> VfsResult<String> {
        let content = self.read_file(path).await?;
        Ok(lines::first(&content, n))
    }

    async fn read_last_lines(&self, path: &str, n: usize) -> VfsResult<String> {
        let content = self.read_file(path).await?;
        Ok(lines::last(&content, n))
    }

    async fn count_lines(&self, path: &str) -> VfsResult<usize> {
        let content = self.read_file(path).await?;
        Ok(lines::count(&content))
    }

    #[tracing::instrument(level = "debug", skip(self, content), fields(len = content.len()))]
    async fn write_file(&self, path: &str, content: &str) -> VfsResult<()> {
        self.root
            .write()
            .write_file(&path::normalize(path), content, false)
    }

    #[tracing::instrument(level = "debug", skip(self, content), fields(len = content.len()))]
    async fn append_file(&self, path: &str, content: &str) -> VfsResult<()> {
        self.root
            .write()
            .write_file(&path::normalize(path), content, true)
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        self.root.write().mkdir(&path::normalize(path))
    }

    async fn unlink(&self, path: &str) -> VfsResult<()> {
        self.root.write().unlink(&path::normalize(path))
    }

    async fn rmdir(&self, path: &str) -> VfsResult<()> {
        self.root.write().rmdir(&path::normalize(path))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn copy_file(&self, src: &str, dest: &str) -> VfsResult<()> {
        let mut root = self.root.write();
        let content = root.read_file(&path::normalize(src))?;
        root.write_file(&path::normalize(dest), &content, false)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        self.root
            .write()
            .rename(&path::normalize(from), &path::normalize(to))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn materialize(&self, path: &str, target_dir: Option<&Path>) -> VfsResult<PathBuf> {
        if !host::real_fs_available() {
            return Err(VfsError::unavailable("host has no real filesystem"));
        }
        let normalized = path::normalize(path);
        let content = self.root.read().read_file(&normalized)?;

        let dir = target_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let ext = path::extname(&normalized);
        let stem = path::basename(&normalized, Some(ext.as_str()));
        let name = format!(
            "{}-{}-{}{}",
            stem,
            epoch_millis(SystemTime::now()),
            MATERIALIZE_SEQ.fetch_add(1, Ordering::Relaxed),
            ext
        );
        let real = std::path::absolute(dir.join(name))
            .map_err(|e| VfsError::from_io(e, dir.display().to_string()))?;

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| VfsError::from_io(e, dir.display().to_string()))?;
        tokio::fs::write(&real, content)
            .await
            .map_err(|e| VfsError::from_io(e, real.display().to_string()))?;
        tracing::debug!(real = %real.display(), "materialized");
        Ok(real)
    }
}
