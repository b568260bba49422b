//! Span naming and truncation helpers.

use std::fmt;

/// Derive a span name from a SQL statement.
///
/// Statements with at least two whitespace-separated tokens are named after
/// their upper-cased first token (`SELECT`, `INSERT`, ...). Anything shorter
/// falls back to `default`.
pub fn operation_name(sql: &str, default: &str) -> String {
    let mut tokens = sql.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(first), Some(_)) => first.to_uppercase(),
        _ => default.to_string(),
    }
}

/// Keep at most `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Render a parameter list with `Debug` and keep its first `max_chars` characters.
pub fn prepared_input<P: fmt::Debug>(params: &[P], max_chars: usize) -> String {
    let rendered = format!("{params:?}");
    truncate_chars(&rendered, max_chars).to_string()
}
