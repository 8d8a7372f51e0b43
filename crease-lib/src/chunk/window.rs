use crate::chunk::{chunk_id, Chunk, Chunker};
use crate::document::{Document, PAGE_BREAK};
use crate::{Error, Result};

/// Sliding-window chunker that prefers natural boundaries
///
/// Good for: extracted PDF text, where layout gives paragraph breaks but
/// sentence lengths vary.
///
/// Each window holds at most `max_chars` characters and the next window
/// starts `overlap_chars` before the previous one ended. A window that is not
/// the last one ends, in order of preference, after a paragraph break, after
/// a sentence terminator, or at the hard `max_chars` edge.
#[derive(Debug, Clone)]
pub struct WindowChunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl WindowChunker {
    /// Create a chunker; `overlap_chars` must be smaller than `max_chars`.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(Error::Configuration("max_chars must be greater than zero".into()));
        }
        if overlap_chars >= max_chars {
            return Err(Error::Configuration(format!(
                "overlap_chars ({overlap_chars}) must be smaller than max_chars ({max_chars})"
            )));
        }
        Ok(Self { max_chars, overlap_chars })
    }

    #[must_use]
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    #[must_use]
    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Compute `(start, end)` character spans for the given text.
    fn spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let len = chars.len();
        let mut spans = Vec::with_capacity(len / (self.max_chars - self.overlap_chars) + 1);
        let mut start = 0;

        loop {
            let hard_end = start + self.max_chars;
            if hard_end >= len {
                spans.push((start, len));
                return spans;
            }

            let end = self.window_end(chars, start, hard_end);
            spans.push((start, end));
            start = end - self.overlap_chars;
        }
    }

    /// Pick the end of a non-final window.
    ///
    /// Candidates never fall below `start + overlap_chars + 1`, so every
    /// window advances the cursor.
    fn window_end(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = start + (self.overlap_chars + 1).max(self.max_chars / 2);

        last_position(floor, hard_end, |end| is_paragraph_end(chars, end))
            .or_else(|| last_position(floor, hard_end, |end| is_sentence_end(chars, end)))
            .unwrap_or(hard_end)
    }
}

impl Chunker for WindowChunker {
    fn name(&self) -> &str {
        "window"
    }

    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.raw_text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = document.raw_text.chars().collect();
        let mut chunks = Vec::new();

        // running page count, spans are ordered by start
        let mut page = 1;
        let mut counted = 0;
        let label = document.label();

        for (sequence_index, (start, end)) in self.spans(&chars).into_iter().enumerate() {
            page += chars[counted..start].iter().filter(|&&c| c == PAGE_BREAK).count();
            counted = start;

            chunks.push(Chunk {
                id: chunk_id(&document.id, sequence_index),
                document_id: document.id.clone(),
                text: chars[start..end].iter().collect(),
                sequence_index,
                char_offset: start,
                page,
                label: label.clone(),
            });
        }
        chunks
    }
}

/// Largest `end` in `floor..=ceiling` satisfying `accept`.
fn last_position(floor: usize, ceiling: usize, accept: impl Fn(usize) -> bool) -> Option<usize> {
    (floor..=ceiling).rev().find(|&end| accept(end))
}

/// `end` sits just after a blank line or a page break.
fn is_paragraph_end(chars: &[char], end: usize) -> bool {
    match end {
        0 => false,
        1 => chars[0] == PAGE_BREAK,
        _ => chars[end - 1] == PAGE_BREAK || (chars[end - 1] == '\n' && chars[end - 2] == '\n'),
    }
}

/// `end` sits just after the whitespace following `.`, `!` or `?`.
fn is_sentence_end(chars: &[char], end: usize) -> bool {
    end >= 2 && chars[end - 1].is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?')
}
