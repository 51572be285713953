//! Fragment alignment data
//!
//! Per-segment timing for each text fragment within its clip, supplied by
//! the narration pipeline as a sidecar JSON document (a bare array of
//! `{start, length}` objects in fragment order).

use serde::{Deserialize, Serialize};

/// Timing of one fragment within its segment's clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentEntry {
    /// Offset of the fragment's narration from clip start, milliseconds
    pub start: u64,
    /// Narration duration of the fragment, milliseconds
    pub length: u64,
}

/// Immutable, ordered alignment for one segment
///
/// Index-aligned with the segment's fragment ids. `start` values are
/// expected to be non-decreasing (narration order); input violating that is
/// accepted but yields an undefined highlight order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlignmentSet {
    entries: Vec<AlignmentEntry>,
}

impl AlignmentSet {
    pub fn new(entries: Vec<AlignmentEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, index: usize) -> Option<&AlignmentEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlignmentEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// End of the last narrated fragment, milliseconds from clip start
    pub fn end_ms(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| e.start + e.length)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sidecar_document() {
        let json = r#"[
            {"start": 0, "length": 420},
            {"start": 430, "length": 880},
            {"start": 1320, "length": 510}
        ]"#;

        let set: AlignmentSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.get(1),
            Some(&AlignmentEntry {
                start: 430,
                length: 880
            })
        );
        assert_eq!(set.end_ms(), 1830);
    }

    #[test]
    fn test_empty_set() {
        let set = AlignmentSet::default();
        assert!(set.is_empty());
        assert_eq!(set.end_ms(), 0);
        assert_eq!(set.get(0), None);
    }
}
