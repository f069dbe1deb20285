//! Splitting replies into transport-sized messages.

/// Sent in place of an empty reply so every response yields a message.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "(empty response)";

/// Split `text` into chunks of at most `max_len` UTF-16 code units, the unit
/// Telegram measures message length in.
///
/// Chunks prefer to end just after a newline: when a window does not reach the
/// end of the text, the cut moves back to the last newline inside the window
/// (never the window's first character). Windows without one are cut hard at
/// the last whole character that fits. Concatenating the chunks gives back
/// `text` exactly.
#[must_use]
pub fn split(text: &str, max_len: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![EMPTY_RESPONSE_PLACEHOLDER.to_string()];
    }
    let max_len = max_len.max(1);

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::with_capacity(text.len() / max_len + 1);
    let mut start = 0;

    while start < chars.len() {
        let edge = window_edge(&chars, start, max_len);
        let end = if edge >= chars.len() {
            chars.len()
        } else {
            chars[start + 1..edge]
                .iter()
                .rposition(|&c| c == '\n')
                .map_or(edge, |offset| start + 1 + offset + 1)
        };
        chunks.push(chars[start..end].iter().collect());
        start = end;
    }

    chunks
}

/// Index one past the last char of the window opening at `start`. A window
/// always holds at least one char, even one wider than `max_len`.
fn window_edge(chars: &[char], start: usize, max_len: usize) -> usize {
    let mut units = 0;
    let mut edge = start;
    while edge < chars.len() {
        units += chars[edge].len_utf16();
        if units > max_len {
            break;
        }
        edge += 1;
    }
    edge.max(start + 1)
}
