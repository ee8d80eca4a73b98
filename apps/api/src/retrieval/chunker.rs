//! Word-window chunker — splits raw resume text into overlapping, fixed-size windows.
//!
//! Windows are measured in whitespace-delimited tokens. Each window advances by
//! `size - overlap` tokens and the last window is the first one whose end reaches
//! the token count, so a document of `size` tokens or fewer yields exactly one chunk.

use thiserror::Error;

/// Invalid chunking parameters. Never corrected silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkConfigError {
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// A contiguous, ordered slice of the source words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within its document (0-based).
    pub index: usize,
    /// Window tokens joined by single spaces.
    pub text: String,
}

/// Window size and overlap, both in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: 300,
            overlap: 50,
        }
    }
}

impl ChunkConfig {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkConfigError> {
        let config = Self { size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChunkConfigError> {
        if self.overlap >= self.size {
            return Err(ChunkConfigError::OverlapTooLarge {
                size: self.size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Tokens the window advances per step. Only meaningful on a validated config.
    fn stride(&self) -> usize {
        self.size - self.overlap
    }

    pub fn chunk(&self, text: &str) -> Result<Vec<Chunk>, ChunkConfigError> {
        chunk_text(text, self.size, self.overlap)
    }
}

/// Splits `text` into overlapping word windows.
///
/// Fails with [`ChunkConfigError`] before touching the text when `overlap >= size`.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkConfigError> {
    let config = ChunkConfig::new(size, overlap)?;

    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + config.size).min(words.len());
        chunks.push(Chunk {
            index: chunks.len(),
            text: words[start..end].join(" "),
        });
        if end == words.len() {
            break;
        }
        start += config.stride();
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn expected_count(words: usize, size: usize, overlap: usize) -> usize {
        if words == 0 {
            return 0;
        }
        // Any non-empty text short enough to fit one window is a single chunk,
        // including texts no longer than the overlap.
        let covered = words.saturating_sub(overlap);
        covered.div_ceil(size - overlap).max(1)
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
        assert!(chunk_text("   \n\t  ", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("Rust  engineer\nwith   tokio", 10, 3).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Rust engineer with tokio");
    }

    #[test]
    fn test_text_within_overlap_is_single_chunk() {
        let chunks = chunk_text("w0", 2, 1).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "w0");

        let chunks = chunk_text(&numbered_words(3), 10, 5).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_exactly_size_words_is_single_chunk() {
        let chunks = chunk_text(&numbered_words(300), 300, 50).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_windows_overlap_by_configured_amount() {
        let chunks = chunk_text(&numbered_words(10), 4, 1).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["w0 w1 w2 w3", "w3 w4 w5 w6", "w6 w7 w8 w9"]
        );
    }

    #[test]
    fn test_last_window_may_be_partial() {
        let chunks = chunk_text(&numbered_words(9), 4, 1).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].text, "w6 w7 w8");
    }

    #[test]
    fn test_chunk_count_matches_formula() {
        for words in 0..40 {
            for size in 1..8 {
                for overlap in 0..size {
                    let chunks = chunk_text(&numbered_words(words), size, overlap).unwrap();
                    assert_eq!(
                        chunks.len(),
                        expected_count(words, size, overlap),
                        "words={words} size={size} overlap={overlap}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_windows_cover_every_token() {
        let text = numbered_words(37);
        let chunks = chunk_text(&text, 6, 2).unwrap();
        let mut seen = vec![false; 37];
        for chunk in &chunks {
            for word in chunk.text.split(' ') {
                let i: usize = word[1..].parse().unwrap();
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_indices_are_sequential() {
        let chunks = chunk_text(&numbered_words(50), 8, 3).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_overlap_not_smaller_than_size_is_rejected() {
        assert_eq!(
            chunk_text("anything at all", 5, 5),
            Err(ChunkConfigError::OverlapTooLarge {
                size: 5,
                overlap: 5
            })
        );
        assert!(chunk_text("", 3, 7).is_err());
        assert!(chunk_text("zero size", 0, 0).is_err());
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = numbered_words(123);
        assert_eq!(
            chunk_text(&text, 20, 5).unwrap(),
            chunk_text(&text, 20, 5).unwrap()
        );
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ChunkConfig::default().validate().is_ok());
    }
}
