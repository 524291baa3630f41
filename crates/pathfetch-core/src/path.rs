//! Helpers for dotted paths such as `topics.123.entries.*.author`.

/// Segment meaning "every member of the enclosing collection".
pub const WILDCARD: &str = "*";

/// Separator between ids in a batched segment (`entries.1,2,3`).
pub const ID_SEPARATOR: char = ',';

pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".")
}

/// Appends `key` to `parent`, treating an empty parent as the root.
pub fn child(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_owned()
    } else {
        format!("{parent}.{key}")
    }
}

/// Everything before the last segment, or an empty string for top-level paths.
pub fn parent(path: &str) -> &str {
    match path.rfind('.') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// `true` when `long` continues `short` past a segment boundary.
pub fn is_strict_prefix(short: &str, long: &str) -> bool {
    long.len() > short.len() && long.starts_with(short) && long[short.len()..].starts_with('.')
}

pub fn split_ids(segment: &str) -> Vec<String> {
    segment.split(ID_SEPARATOR).map(str::to_owned).collect()
}

pub fn join_ids<S: AsRef<str>>(ids: &[S]) -> String {
    ids.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}
