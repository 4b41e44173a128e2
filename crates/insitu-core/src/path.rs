//! `/`-separated node paths.
//!
//! Paths address children relative to a node: `"state/timestep"`,
//! `"channels/grid/data"`. Empty segments are ignored, so leading,
//! trailing and doubled separators are harmless. List elements are
//! addressed by their decimal index.

use smallvec::SmallVec;

/// Path separator.
pub const SEPARATOR: char = '/';

/// Segments of a split path. Wire paths are shallow, so eight inline
/// segments avoid allocation in practice.
pub type Segments<'a> = SmallVec<[&'a str; 8]>;

/// Split `path` into its non-empty segments.
pub fn split(path: &str) -> Segments<'_> {
    path.split(SEPARATOR).filter(|s| !s.is_empty()).collect()
}

/// Join a parent path and a child name.
///
/// An empty parent yields the child unchanged.
pub fn join(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches(SEPARATOR);
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}{SEPARATOR}{child}")
    }
}

/// Parse a list index segment.
pub(crate) fn index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
