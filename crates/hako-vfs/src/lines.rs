//! Line-oriented views over text content.
//!
//! Lines follow [`str::lines`]: `\n` or `\r\n` ends a line, a trailing
//! terminator does not open an empty last line, and empty content has no
//! lines. The disk backend's streaming readers use the same rules.

/// Lines `[start, end)` joined with `\n`. Out-of-range bounds are clamped.
pub fn slice(content: &str, start: usize, end: usize) -> String {
    if end <= start {
        return String::new();
    }
    content
        .lines()
        .skip(start)
        .take(end - start)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The first `n` lines.
pub fn first(content: &str, n: usize) -> String {
    slice(content, 0, n)
}

/// The last `n` lines.
pub fn last(content: &str, n: usize) -> String {
    let all: Vec<&str> = content.lines().collect();
    let skip = all.len().saturating_sub(n);
    all[skip..].join("\n")
}

/// Number of lines.
pub fn count(content: &str) -> usize {
    content.lines().count()
}
