//! Question sanitizer
//!
//! Prompt hygiene for the operator's free-text question. Removing these
//! characters lowers the chance of the model echoing injected SQL fragments;
//! it is not a security boundary, the validator is.

/// Characters removed from a question before it reaches a prompt.
pub const STRIPPED_CHARS: [char; 4] = [';', '"', '\'', '\\'];

/// Strip [`STRIPPED_CHARS`] and trim surrounding whitespace. Never fails.
pub fn sanitize_question(raw: &str) -> String {
    raw.chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}
