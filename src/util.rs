//! Shared utility functions used across the codebase.

/// Return at most `max_chars` characters of `text`, cut on a char boundary.
///
/// Used for log lines and error bodies where the full payload would be noise.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
