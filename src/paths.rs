//! Shortening of third-party source paths in exception and stack frames.
//!
//! Dependency sources live under one of two install roots: a `vendor`
//! directory produced by `cargo vendor`, or the per-index directory of
//! cargo's registry cache (`~/.cargo/registry/src/<index>/`). Everything up
//! to and including the first such root is dropped, leaving paths like
//! `serde-1.0.210/src/de/mod.rs`.

const VENDOR_DIR: &str = "vendor";
const REGISTRY_DIRS: [&str; 2] = ["registry", "src"];

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    match bytes {
        [b'/' | b'\\', ..] => true,
        [drive, b':', sep, ..] => drive.is_ascii_alphabetic() && (*sep == b'/' || *sep == b'\\'),
        _ => false,
    }
}

/// Strip everything up to the first install root of an absolute path.
///
/// Relative paths, including ones this function already shortened, are
/// returned unchanged, so applying it twice is the same as applying it once.
pub fn relativize(path: &str) -> &str {
    if !is_absolute(path) {
        return path;
    }

    // (start, end) byte offsets of every non-empty component.
    let mut components: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for (i, c) in path.char_indices() {
        if is_separator(c) {
            if i > start {
                components.push((start, i));
            }
            start = i + c.len_utf8();
        }
    }
    if path.len() > start {
        components.push((start, path.len()));
    }

    let name = |idx: usize| &path[components[idx].0..components[idx].1];
    let is_root = |idx: usize| {
        name(idx) == VENDOR_DIR
            || (idx >= 2 && name(idx - 2) == REGISTRY_DIRS[0] && name(idx - 1) == REGISTRY_DIRS[1])
    };

    for idx in 0..components.len() {
        if is_root(idx) && idx + 1 < components.len() {
            return &path[components[idx + 1].0..];
        }
    }
    path
}
