//! Label extraction from narrative answers
//!
//! The model is asked to tag its answer with `[Positive]`, `[Neutral]` or
//! `[Negative]`. The last tag wins; tags are then removed from the narrative.

use crate::types::Label;
use regex::Regex;
use std::sync::OnceLock;

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\[(positive|neutral|negative)\]|\b(positive|neutral|negative)\b")
            .expect("Invalid label pattern")
    })
}

fn strip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\[?\b(positive|neutral|negative)\b\]?")
            .expect("Invalid strip pattern")
    })
}

/// Label of the last label token in `text`, if any
pub fn find_label(text: &str) -> Option<Label> {
    label_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .last()
        .and_then(|m| m.as_str().parse().ok())
}

/// Remove every label token (with optional brackets) and trim
///
/// Applying it twice gives the same result as applying it once.
pub fn strip_labels(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = strip_pattern().replace_all(&current, "").trim().to_string();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Split a narrative into its label and the label-free justification
///
/// Without a label token the text is returned unmodified.
pub fn extract_label(text: &str) -> (Label, String) {
    match find_label(text) {
        Some(label) => (label, strip_labels(text)),
        None => (Label::Unlabeled, text.to_string()),
    }
}
