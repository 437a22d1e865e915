//! Character-level diff between two normalized field values.
//!
//! Uses the linear-space Myers diff from `similar`; runs of the same
//! operation are merged into a single [`DiffChunk`], so a replacement reads
//! "removed, then added".

use std::time::Duration;

use serde::{Deserialize, Serialize};
use similar::{Algorithm, ChangeTag, TextDiff};

/// A run of characters that is common to both sides, added, or removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffChunk {
    pub value: String,
    /// Number of characters in `value`
    pub count: usize,
    pub added: bool,
    pub removed: bool,
}

impl DiffChunk {
    pub fn is_common(&self) -> bool {
        !self.added && !self.removed
    }
}

/// Upper bound on the search for a minimal script; past it the diff stays
/// valid but may not be minimal
const DIFF_DEADLINE: Duration = Duration::from_millis(500);

/// Diff `old` against `new` character by character.
///
/// Two empty inputs yield no chunks. Within each run of edits between two
/// common chunks, the removed characters come before the added ones.
pub fn diff_chars(old: &str, new: &str) -> Vec<DiffChunk> {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_DEADLINE)
        .diff_chars(old, new);

    let mut chunks = Vec::new();
    let mut common = String::new();
    let mut removed = String::new();
    let mut added = String::new();

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Equal => {
                flush_edits(&mut chunks, &mut removed, &mut added);
                common.push_str(change.value());
            }
            ChangeTag::Delete => {
                flush(&mut chunks, &mut common, false, false);
                removed.push_str(change.value());
            }
            ChangeTag::Insert => {
                flush(&mut chunks, &mut common, false, false);
                added.push_str(change.value());
            }
        }
    }
    flush(&mut chunks, &mut common, false, false);
    flush_edits(&mut chunks, &mut removed, &mut added);
    chunks
}

fn flush_edits(chunks: &mut Vec<DiffChunk>, removed: &mut String, added: &mut String) {
    flush(chunks, removed, false, true);
    flush(chunks, added, true, false);
}

fn flush(chunks: &mut Vec<DiffChunk>, run: &mut String, added: bool, removed: bool) {
    if run.is_empty() {
        return;
    }
    let value = std::mem::take(run);
    chunks.push(DiffChunk {
        count: value.chars().count(),
        value,
        added,
        removed,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuild(chunks: &[DiffChunk]) -> (String, String) {
        let old = chunks
            .iter()
            .filter(|c| !c.added)
            .map(|c| c.value.as_str())
            .collect();
        let new = chunks
            .iter()
            .filter(|c| !c.removed)
            .map(|c| c.value.as_str())
            .collect();
        (old, new)
    }

    #[test]
    fn test_empty_inputs() {
        assert!(diff_chars("", "").is_empty());
    }

    #[test]
    fn test_identical_is_single_common_chunk() {
        let chunks = diff_chars("Alice", "Alice");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_common());
        assert_eq!(chunks[0].count, 5);
    }

    #[test]
    fn test_alice_to_alicia() {
        let chunks = diff_chars("Alice", "Alicia");
        assert_eq!(chunks[0].value, "Alic");
        assert!(chunks[0].is_common());
        assert_eq!(rebuild(&chunks), ("Alice".to_string(), "Alicia".to_string()));
        let changed: usize = chunks.iter().filter(|c| !c.is_common()).map(|c| c.count).sum();
        assert_eq!(changed, 3);
    }

    #[test]
    fn test_pure_insert_and_delete() {
        let inserted = diff_chars("", "abc");
        assert_eq!(inserted.len(), 1);
        assert!(inserted[0].added);
        assert_eq!(inserted[0].value, "abc");

        let removed = diff_chars("abc", "");
        assert_eq!(removed.len(), 1);
        assert!(removed[0].removed);
    }

    #[test]
    fn test_replacement_lists_removal_first() {
        let chunks = diff_chars("0", "1");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].removed);
        assert_eq!(chunks[0].value, "0");
        assert!(chunks[1].added);
        assert_eq!(chunks[1].value, "1");
    }

    #[test]
    fn test_multibyte_characters() {
        let chunks = diff_chars("café", "cafe");
        assert_eq!(rebuild(&chunks), ("café".to_string(), "cafe".to_string()));
        assert_eq!(chunks[0].value, "caf");
    }

    #[test]
    fn test_long_replacement_is_two_chunks() {
        let old = "a".repeat(4000);
        let new = "b".repeat(4000);
        let chunks = diff_chars(&old, &new);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].removed);
        assert_eq!(chunks[0].count, 4000);
        assert!(chunks[1].added);
        assert_eq!(chunks[1].count, 4000);
    }

    #[test]
    fn test_long_text_edit_rebuilds_both_sides() {
        let paragraph = "Experienced welder, certified for TIG and MIG processes. ";
        let old = paragraph.repeat(400);
        let mut new = old.replacen("TIG", "MAG", 150);
        new.push_str("Available immediately.");

        let chunks = diff_chars(&old, &new);
        assert!(chunks[0].is_common());
        assert_eq!(rebuild(&chunks), (old, new));
    }
}
