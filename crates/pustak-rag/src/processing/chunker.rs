use crate::types::Chunk;

/// Fixed-window chunker with overlap.
///
/// Windows are measured in characters, not bytes, so multi-byte text never
/// splits inside a code point. Document structure is unreliable after PDF
/// extraction, so no sentence or paragraph awareness is attempted; the
/// overlap preserves context severed at window boundaries instead.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Callers must ensure `chunk_overlap < chunk_size` (see `RagConfig::validate`).
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        debug_assert!(chunk_size > 0);
        debug_assert!(chunk_overlap < chunk_size);
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Lazy iterator over trimmed, non-empty windows of `text`.
    ///
    /// The window advances by `chunk_size - chunk_overlap` characters; the
    /// final window is whatever remains and may be shorter. Empty input
    /// yields an empty sequence. Each call returns a fresh iterator with no
    /// shared state.
    pub fn windows<'a>(&self, text: &'a str) -> ChunkWindows<'a> {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        ChunkWindows {
            text,
            boundaries,
            chunk_size: self.chunk_size,
            stride: (self.chunk_size - self.chunk_overlap).max(1),
            pos: 0,
            done: text.is_empty(),
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.windows(text).map(str::to_string).collect()
    }

    /// Chunk one page of a document, attaching provenance and 1-based
    /// ordinals over the surviving (non-empty) windows.
    pub fn chunk_page(&self, source: &str, page: usize, text: &str) -> Vec<Chunk> {
        self.windows(text)
            .enumerate()
            .map(|(i, window)| Chunk {
                text: window.to_string(),
                source: source.to_string(),
                page,
                sequence_id: Chunk::sequence_id_for(source, page, i + 1),
            })
            .collect()
    }
}

pub struct ChunkWindows<'a> {
    text: &'a str,
    /// Byte offset of each char boundary, with `text.len()` appended.
    boundaries: Vec<usize>,
    chunk_size: usize,
    stride: usize,
    /// Current window start, in characters.
    pos: usize,
    done: bool,
}

impl<'a> ChunkWindows<'a> {
    fn char_count(&self) -> usize {
        self.boundaries.len() - 1
    }
}

impl<'a> Iterator for ChunkWindows<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            if self.done || self.pos >= self.char_count() {
                return None;
            }
            let start = self.pos;
            let end = (start + self.chunk_size).min(self.char_count());
            let window = &self.text[self.boundaries[start]..self.boundaries[end]];

            if end == self.char_count() {
                self.done = true;
            } else {
                self.pos += self.stride;
            }

            let trimmed = window.trim();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = TextChunker::new(100, 20);
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\t  ").is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = TextChunker::new(100, 20);
        let chunks = chunker.chunk("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn chunk_count_matches_window_arithmetic() {
        // L = 1000, S = 100, O = 20 -> ceil((1000 - 20) / 80) = 13 windows.
        let text: String = std::iter::repeat('x').take(1000).collect();
        let chunker = TextChunker::new(100, 20);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 13);
        assert!(chunks[..chunks.len() - 1].iter().all(|c| c.len() == 100));
    }

    #[test]
    fn overlap_repeats_window_tails() {
        let text: String = ('a'..='z').cycle().take(200).collect();
        let chunker = TextChunker::new(100, 20);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 2);
        // Last 20 chars of the first window open the second one.
        assert_eq!(&chunks[0][80..], &chunks[1][..20]);
    }

    #[test]
    fn final_window_is_the_remainder() {
        let text: String = std::iter::repeat('y').take(250).collect();
        let chunker = TextChunker::new(100, 0);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn multibyte_text_never_splits_a_char() {
        let text: String = std::iter::repeat('日').take(150).collect();
        let chunker = TextChunker::new(100, 10);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn windows_iterator_is_restartable() {
        let text = "the quick brown fox jumps over the lazy dog";
        let chunker = TextChunker::new(10, 2);
        let first: Vec<_> = chunker.windows(text).collect();
        let second: Vec<_> = chunker.windows(text).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn sequence_ids_are_deterministic_and_unique() {
        let text: String = ('a'..='z').cycle().take(500).collect();
        let chunker = TextChunker::new(100, 20);
        let a = chunker.chunk_page("book.pdf", 3, &text);
        let b = chunker.chunk_page("book.pdf", 3, &text);
        assert_eq!(a, b);
        assert_eq!(a[0].sequence_id, "book.pdf_p3_c1");

        let mut ids: Vec<_> = a.iter().map(|c| c.sequence_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), a.len());
    }

    #[test]
    fn whitespace_only_windows_are_dropped() {
        let mut text = String::new();
        text.push_str(&"a".repeat(50));
        text.push_str(&" ".repeat(120));
        text.push_str(&"b".repeat(50));
        let chunker = TextChunker::new(50, 0);
        let chunks = chunker.chunk(&text);
        assert!(chunks.iter().all(|c| !c.trim().is_empty()));
        assert!(chunks.len() < 5);
    }
}
