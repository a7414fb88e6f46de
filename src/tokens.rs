//! Token estimation for LLM context budgeting.
//!
//! The estimate is a deliberate approximation — roughly four characters per
//! token — used only for progress display and context-size accounting.  It
//! does **not** match any real tokenizer's output and must never be used to
//! enforce a provider's hard token limit.
//!
//! # Example
//!
//! ```rust
//! use mindchat::tokens::{chunk_tokens, estimate_tokens};
//!
//! assert_eq!(estimate_tokens(""), 0);
//! assert_eq!(estimate_tokens(&"a".repeat(400)), 100);
//! assert_eq!(chunk_tokens(&["abcd".into(), "efgh".into()]), 2);
//! ```

/// Estimate the token count of `text`.
///
/// The text is trimmed and internal whitespace runs are collapsed to single
/// spaces before counting, so formatting differences do not inflate the
/// estimate.  Returns `ceil(chars / 4)`; empty or whitespace-only text
/// returns 0.
pub fn estimate_tokens(text: &str) -> usize {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars = normalized.chars().count();
    chars.div_ceil(4)
}

/// Sum of [`estimate_tokens`] over every chunk.
pub fn chunk_tokens(chunks: &[String]) -> usize {
    chunks.iter().map(|c| estimate_tokens(c)).sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn whitespace_only_is_zero() {
        assert_eq!(estimate_tokens("   \t\n  "), 0);
    }

    #[test]
    fn four_hundred_chars_is_one_hundred_tokens() {
        assert_eq!(estimate_tokens(&"a".repeat(400)), 100);
    }

    #[test]
    fn rounds_up_to_next_token() {
        // 5 chars → ceil(5/4) = 2
        assert_eq!(estimate_tokens("abcde"), 2);
        // 1 char → 1
        assert_eq!(estimate_tokens("a"), 1);
    }

    #[test]
    fn internal_whitespace_is_collapsed() {
        assert_eq!(estimate_tokens("a   b"), estimate_tokens("a b"));
        assert_eq!(estimate_tokens("a\t\n b"), estimate_tokens("a b"));
    }

    #[test]
    fn leading_and_trailing_whitespace_is_trimmed() {
        assert_eq!(estimate_tokens("  hello  "), estimate_tokens("hello"));
    }

    #[test]
    fn counts_chars_not_bytes() {
        // Four multi-byte characters → one token, even though the UTF-8
        // byte length is larger.
        assert_eq!(estimate_tokens("สบาย"), 1);
    }

    #[test]
    fn chunk_tokens_sums_per_chunk_estimates() {
        let chunks = vec!["abcd".to_string(), "efghi".to_string(), String::new()];
        // 1 + 2 + 0
        assert_eq!(chunk_tokens(&chunks), 3);
    }

    #[test]
    fn chunk_tokens_empty_list_is_zero() {
        assert_eq!(chunk_tokens(&[]), 0);
    }
}
