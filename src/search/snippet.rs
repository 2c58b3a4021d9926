//! Snippet extraction for search results
//!
//! Shared across all search modes: the first 200 characters of the user
//! message, whitespace runs collapsed to single spaces, with an ellipsis
//! marker when truncation occurred.

const SNIPPET_MAX_CHARS: usize = 200;

/// Extract a compact snippet from a user message (UTF-8 safe)
pub fn extract(user_message: &str) -> String {
    let head: String = user_message.chars().take(SNIPPET_MAX_CHARS).collect();
    let collapsed = head.split_whitespace().collect::<Vec<_>>().join(" ");

    if user_message.chars().count() > SNIPPET_MAX_CHARS {
        format!("{}...", collapsed)
    } else {
        collapsed
    }
}
