//! Text chunking.
//!
//! This module provides the [`Chunker`] trait and [`WordBoundaryChunker`],
//! which splits captured page text into bounded segments that respect word
//! boundaries where it can.

/// A strategy for splitting text into retrieval-sized segments.
///
/// Implementations must be deterministic: the same input always yields the
/// same sequence of chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` into an ordered sequence of non-empty chunks.
    ///
    /// Returns an empty `Vec` for empty or whitespace-only text.
    fn chunk(&self, text: &str) -> Vec<String>;
}

/// Splits text into chunks of at most `max_length` characters, breaking on
/// whitespace when a boundary falls in the second half of the window.
///
/// Lengths are counted in `char`s. A chunk only exceeds `max_length` when it
/// holds no whitespace. That is either a source word longer than
/// `max_length`, or the tail of a word that an earlier window cut hard: with
/// `max_length` 8, `"a bcdefghijklmnop"` yields `"a bcdefg"` and then
/// `"hijklmnop"`.
///
/// # Example
///
/// ```rust
/// use devtools_rag::{Chunker, WordBoundaryChunker};
///
/// let chunker = WordBoundaryChunker::new(12);
/// let chunks = chunker.chunk("TypeError: x is undefined");
/// assert_eq!(chunks, vec!["TypeError: x", "is undefined"]);
/// ```
#[derive(Debug, Clone)]
pub struct WordBoundaryChunker {
    max_length: usize,
}

impl WordBoundaryChunker {
    /// Create a new `WordBoundaryChunker`. A `max_length` of zero is treated as one.
    pub fn new(max_length: usize) -> Self {
        Self { max_length: max_length.max(1) }
    }

    /// The configured maximum chunk length in characters.
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Chunker for WordBoundaryChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.max_length)
    }
}

/// Split `text` into chunks of at most `max_length` characters.
///
/// Within each window the last whitespace at or before the cutoff is used as
/// the break point, provided it lies beyond half of `max_length`; otherwise
/// the window is cut hard at `max_length`, possibly mid-word. A window
/// holding no whitespace at all is extended to the next whitespace, so the
/// remainder of a hard-cut word can also come out longer than `max_length`.
/// Chunks are trimmed and empty chunks dropped.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    let max_length = max_length.max(1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        while start < len && chars[start].is_whitespace() {
            start += 1;
        }
        if start >= len {
            break;
        }

        let cutoff = start + max_length;
        let end = if cutoff >= len {
            len
        } else {
            // `cutoff` itself is a valid break point, as in a trailing space.
            match (start..=cutoff).rev().find(|&i| chars[i].is_whitespace()) {
                Some(space) if space > start + max_length / 2 => space,
                Some(_) => cutoff,
                None => {
                    (cutoff..len).find(|&i| chars[i].is_whitespace()).unwrap_or(len)
                }
            }
        };

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        start = end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(chunk_text("hello world", 500), vec!["hello world"]);
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("   \n\t ", 10).is_empty());
    }

    #[test]
    fn breaks_on_late_whitespace() {
        let chunks = chunk_text("alpha beta gamma delta", 12);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn hard_cut_when_boundary_is_too_early() {
        // The only space is at index 1, before half the window. The rest of
        // the cut word has no boundary left and stays whole.
        let chunks = chunk_text("a bcdefghijklmnop", 8);
        assert_eq!(chunks, vec!["a bcdefg", "hijklmnop"]);
    }

    #[test]
    fn oversized_word_is_kept_whole() {
        let chunks = chunk_text("supercalifragilistic is long", 8);
        assert_eq!(chunks, vec!["supercalifragilistic", "is long"]);
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "ééééé ééééé ééééé";
        let chunks = chunk_text(text, 6);
        assert_eq!(chunks, vec!["ééééé", "ééééé", "ééééé"]);
    }

    #[test]
    fn chunker_trait_uses_configured_length() {
        let chunker = WordBoundaryChunker::new(0);
        assert_eq!(chunker.max_length(), 1);
        assert_eq!(chunker.chunk("ab c"), vec!["ab", "c"]);
    }
}
