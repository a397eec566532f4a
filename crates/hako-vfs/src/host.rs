//! Host environment probe.

/// Whether the host exposes a real filesystem.
///
/// Targets without one (bare `wasm32-unknown-unknown`) compile `std::fs`
/// into stubs that fail at runtime, so this is decided at compile time.
pub fn real_fs_available() -> bool {
    cfg!(not(all(target_family = "wasm", target_os = "unknown")))
}
