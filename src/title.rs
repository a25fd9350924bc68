//! Title normalization.
//!
//! A normalized title is the join key between scrapes: lowercase, with every
//! run of whitespace collapsed to one space and no leading/trailing space.

/// Normalize a publication title into its comparison key.
///
/// Idempotent: `normalize_title(&normalize_title(s)) == normalize_title(s)`.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a title that may be missing.
///
/// `None` passes through unchanged; callers drop such rows.
pub fn normalize_optional_title(title: Option<&str>) -> Option<String> {
    title.map(normalize_title)
}
