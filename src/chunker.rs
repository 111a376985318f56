//! Overlapping word-window chunking with character offsets and page estimates.
//!
//! [`TextChunker`] splits already-extracted document text into fixed-size
//! word windows. Offsets are measured against the *normalized* text (after
//! whitespace collapsing and character filtering), not the raw input.

use regex::Regex;
use tracing::info;

use crate::error::{RagError, Result};
use crate::types::Chunk;

/// Splits normalized text into overlapping windows of whole words.
///
/// Consecutive chunks overlap by `chunk_overlap` words; the final chunk may
/// be shorter than `chunk_size`. Advancement is at least one word per step,
/// so chunking always terminates.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::TextChunker;
///
/// let chunker = TextChunker::new(500, 50)?;
/// let chunks = chunker.chunk("long extracted document text ...");
/// ```
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    disallowed: Regex,
    whitespace: Regex,
}

impl TextChunker {
    /// Create a new `TextChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size` (such a window would never advance).
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be at least 1".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            // Word characters, whitespace, and basic punctuation survive; the
            // rest becomes a space and is folded by the whitespace pass.
            disallowed: Regex::new(r"[^\w\s.,!?;:\-()]").expect("valid charset regex"),
            whitespace: Regex::new(r"\s+").expect("valid whitespace regex"),
        })
    }

    /// Create a chunker from a [`RagConfig`](crate::RagConfig).
    pub fn from_config(config: &crate::RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Normalize text: filter disallowed characters, collapse whitespace
    /// runs to single spaces, and trim.
    pub fn clean_text(&self, text: &str) -> String {
        let stripped = self.disallowed.replace_all(text, " ");
        let collapsed = self.whitespace.replace_all(&stripped, " ");
        collapsed.trim().to_string()
    }

    /// Split `text` into overlapping word-window chunks.
    ///
    /// Returns an empty `Vec` if the text normalizes to zero words. Each
    /// chunk's `page_number` is set to 1; call
    /// [`assign_page_numbers`](Self::assign_page_numbers) once the total
    /// chunk count is known.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let cleaned = self.clean_text(text);
        let words: Vec<&str> = cleaned.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start_idx = 0;
        let mut chunk_index = 0;

        loop {
            let end_idx = (start_idx + self.chunk_size).min(words.len());
            let window = &words[start_idx..end_idx];
            let content = window.join(" ");

            // Offsets measured in characters against the space-joined
            // normalized words, not in bytes.
            let start_char = joined_len(&words[..start_idx]);
            let end_char = start_char + content.chars().count();

            chunks.push(Chunk {
                chunk_index,
                content,
                start_char,
                end_char,
                word_count: window.len(),
                page_number: 1,
            });
            chunk_index += 1;

            if end_idx >= words.len() {
                break;
            }
            // Advance at least one word even when overlap eats the whole step.
            let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
            start_idx += step;
        }

        info!(
            chunk_count = chunks.len(),
            word_count = words.len(),
            "chunked text into word windows"
        );
        chunks
    }

    /// Estimate the page a chunk falls on by linear interpolation.
    ///
    /// With `total_pages` known, interpolates `chunk_index / total_chunks`
    /// across it. Without it, assumes a density of roughly one page per
    /// three chunks. The result is a heuristic, never below 1.
    pub fn estimate_page_number(
        chunk_index: usize,
        total_chunks: usize,
        total_pages: Option<u32>,
    ) -> u32 {
        if total_chunks == 0 {
            return 1;
        }
        let pages = match total_pages {
            Some(p) => p.max(1),
            None => (total_chunks / 3).max(1) as u32,
        };
        let estimated = (chunk_index as f64 / total_chunks as f64 * f64::from(pages)) as u32;
        estimated.max(1)
    }

    /// Assign estimated page numbers across a finished chunk list.
    pub fn assign_page_numbers(chunks: &mut [Chunk], total_pages: Option<u32>) {
        let total = chunks.len();
        for chunk in chunks.iter_mut() {
            chunk.page_number = Self::estimate_page_number(chunk.chunk_index, total, total_pages);
        }
    }
}

/// Length in characters of `words` joined with single spaces.
fn joined_len(words: &[&str]) -> usize {
    if words.is_empty() {
        return 0;
    }
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len() - 1
}
