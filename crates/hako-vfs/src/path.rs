//! Virtual path helpers.
//!
//! Pure string functions shared by every backend. A normalized virtual path
//! always starts with `/`, uses `/` as separator, has no empty, `.` or `..`
//! segments and no trailing slash (except the root itself).
//!
//! Normalization never climbs above the root: `/../etc` becomes `/etc`.
//! Detecting escapes is the job of the disk backend's sandbox, which works
//! on the raw input instead (see [`crate::sandbox`]).

/// The virtual root.
pub const ROOT: &str = "/";

/// Normalize a virtual path.
///
/// Backslashes count as separators, repeated separators collapse, `.`
/// segments vanish and `..` pops the preceding segment (or is dropped at
/// the root). Idempotent.
pub fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            s => stack.push(s),
        }
    }
    if stack.is_empty() {
        return ROOT.to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for s in stack {
        out.push('/');
        out.push_str(s);
    }
    out
}

/// Segments of the normalized path, root-first. The root has none.
pub fn segments(path: &str) -> Vec<String> {
    normalize(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Last segment of `path`, with `suffix` removed when it ends the name.
///
/// The root has an empty basename. A suffix equal to the whole name is
/// left in place.
pub fn basename(path: &str, suffix: Option<&str>) -> String {
    let normalized = normalize(path);
    let name = normalized.rsplit('/').next().unwrap_or_default();
    match suffix {
        Some(suffix) if name.len() > suffix.len() => {
            name.strip_suffix(suffix).unwrap_or(name).to_string()
        }
        _ => name.to_string(),
    }
}

/// Everything but the last segment. The root is its own dirname.
pub fn dirname(path: &str) -> String {
    let normalized = normalize(path);
    match normalized.rfind('/') {
        Some(0) | None => ROOT.to_string(),
        Some(pos) => normalized[..pos].to_string(),
    }
}

/// Concatenate segments and normalize the result.
pub fn join<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = parts
        .into_iter()
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("/");
    normalize(&joined)
}

/// Extension of the basename including the dot, or empty.
///
/// A basename whose only dot is the leading one (`.bashrc`) has no
/// extension.
pub fn extname(path: &str) -> String {
    let name = basename(path, None);
    match name.rfind('.') {
        Some(0) | None => String::new(),
        Some(pos) => name[pos..].to_string(),
    }
}

/// Fold segments left to right into one absolute path.
///
/// An absolute segment replaces everything accumulated so far, a relative
/// one is appended. Zero segments resolve to the root.
pub fn resolve<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut acc = String::from(ROOT);
    for part in parts {
        let part = part.as_ref();
        if part.is_empty() {
            continue;
        }
        if is_absolute(part) {
            acc = part.to_string();
        } else {
            acc.push('/');
            acc.push_str(part);
        }
    }
    normalize(&acc)
}

/// True when `path` starts with a separator.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with(['/', '\\'])
}
