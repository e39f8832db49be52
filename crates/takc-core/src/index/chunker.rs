//! Token-window chunking for compression input
//!
//! A token is a maximal run of non-whitespace characters. Chunks are byte
//! slices of the source text, so a token is never split and the whitespace
//! between tokens inside a chunk is preserved as-is.

use crate::error::{Result, TakcError};
use serde::{Deserialize, Serialize};

/// Document chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the chunk sequence
    pub index: usize,
    pub text: String,
    pub token_count: usize,
    /// Leading tokens repeated from the previous chunk
    pub overlap: usize,
}

impl Chunk {
    /// Text without the tokens already carried by the previous chunk
    pub fn fresh_text(&self) -> &str {
        if self.overlap == 0 {
            return &self.text;
        }
        match token_spans(&self.text).nth(self.overlap) {
            Some((start, _)) => &self.text[start..],
            None => "",
        }
    }
}

/// Count whitespace-delimited tokens
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Collapse every whitespace run to a single space and trim the ends
pub fn clean_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte spans `(start, end)` of each token in `text`
fn token_spans(text: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut offset = 0;
    std::iter::from_fn(move || {
        let rest = &text[offset..];
        let start = offset + rest.find(|c: char| !c.is_whitespace())?;
        let end = text[start..]
            .find(char::is_whitespace)
            .map(|i| start + i)
            .unwrap_or(text.len());
        offset = end;
        Some((start, end))
    })
}

/// Chunking parameters
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_tokens: usize,
    overlap_tokens: usize,
}

impl Chunker {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if max_tokens == 0 {
            return Err(TakcError::InvalidInput(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        if overlap_tokens >= max_tokens {
            return Err(TakcError::InvalidInput(format!(
                "overlap_tokens ({}) must be smaller than max_tokens ({})",
                overlap_tokens, max_tokens
            )));
        }
        Ok(Self {
            max_tokens,
            overlap_tokens,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// Lazily chunk `text`. Each call starts a fresh, independent pass.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            spans: token_spans(text).collect(),
            max_tokens: self.max_tokens,
            overlap_tokens: self.overlap_tokens,
            next_token: 0,
            index: 0,
            done: false,
        }
    }
}

/// Iterator over the chunks of one text
pub struct Chunks<'a> {
    text: &'a str,
    spans: Vec<(usize, usize)>,
    max_tokens: usize,
    overlap_tokens: usize,
    next_token: usize,
    index: usize,
    done: bool,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done || self.next_token >= self.spans.len() {
            return None;
        }

        let first = self.next_token;
        let last = (first + self.max_tokens).min(self.spans.len());
        let start = self.spans[first].0;
        let end = self.spans[last - 1].1;

        let overlap = if self.index == 0 {
            0
        } else {
            self.overlap_tokens
        };

        let chunk = Chunk {
            index: self.index,
            text: self.text[start..end].to_string(),
            token_count: last - first,
            overlap,
        };

        if last >= self.spans.len() {
            self.done = true;
        } else {
            self.next_token = last - self.overlap_tokens;
        }
        self.index += 1;

        Some(chunk)
    }
}

/// Eagerly chunk text into bounded, overlapping windows
pub fn chunk_text(text: &str, max_tokens: usize, overlap_tokens: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(max_tokens, overlap_tokens)?.chunks(text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_small_content() {
        let content = "Small content with five tokens.";
        let chunks = chunk_text(content, 100, 20).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, content);
        assert_eq!(chunks[0].token_count, 5);
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
        assert!(chunk_text("  \n\t ", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_exact_window_is_one_chunk() {
        let chunks = chunk_text("a b c d", 4, 1).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a b c d");
    }

    #[test]
    fn test_overlap_repeats_trailing_tokens() {
        let chunks = chunk_text("t1 t2 t3 t4 t5 t6 t7 t8 t9 t10", 4, 2).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["t1 t2 t3 t4", "t3 t4 t5 t6", "t5 t6 t7 t8", "t7 t8 t9 t10"]
        );
        assert_eq!(chunks[0].overlap, 0);
        assert!(chunks[1..].iter().all(|c| c.overlap == 2));
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_preserves_internal_whitespace() {
        let content = "alpha  beta\n\ngamma delta";
        let chunks = chunk_text(content, 3, 1).unwrap();
        assert_eq!(chunks[0].text, "alpha  beta\n\ngamma");
        assert_eq!(chunks[1].text, "gamma delta");
    }

    #[test]
    fn test_fresh_text_strips_overlap() {
        let chunks = chunk_text("a b c d e f", 4, 2).unwrap();
        assert_eq!(chunks[0].fresh_text(), "a b c d");
        assert_eq!(chunks[1].fresh_text(), "e f");
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(4, 4).is_err());
        assert!(Chunker::new(4, 9).is_err());
    }

    #[test]
    fn test_iterator_is_restartable() {
        let chunker = Chunker::new(3, 1).unwrap();
        let text = "one two three four five six seven";
        let first: Vec<Chunk> = chunker.chunks(text).collect();
        let second: Vec<Chunk> = chunker.chunks(text).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_handles_unicode() {
        let content = "Hello 世界! This is a test with emoji 🎉 and special chars ─ here.";
        let chunks = chunk_text(content, 4, 1).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(content.contains(&chunk.text));
            assert!(chunk.token_count <= 4);
        }
    }

    #[test]
    fn test_clean_whitespace() {
        assert_eq!(clean_whitespace("  a \n\n b\tc  "), "a b c");
        assert_eq!(count_tokens("  a \n\n b\tc  "), 3);
    }
}
