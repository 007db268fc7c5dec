use super::vocabulary::{END_WORD, START_WORD};
use std::collections::HashSet;

/// Strip sequence markers and drop every repeated word, keeping the first
/// occurrence of each. Repeats are removed across the whole caption, not just
/// adjacent ones.
pub fn clean_caption(raw: &str) -> String {
    let text = raw.replace(START_WORD, "").replace(END_WORD, "");

    let mut seen = HashSet::new();
    text.split_whitespace()
        .filter(|word| seen.insert(*word))
        .collect::<Vec<_>>()
        .join(" ")
}
