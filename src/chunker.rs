//! Deterministic semantic text chunking with fixed overlap.
//!
//! Segments text into sentences, then greedily packs sentences into chunks
//! bounded by a token budget, seeding each new chunk with the trailing
//! sentences of the previous one so adjacent chunks overlap by at most
//! `overlap_tokens`.

use serde::{Deserialize, Serialize};

/// Chunking parameters. Defaults mirror the upstream GraphRAG pipeline's
/// extraction batching: large enough chunks to amortize model calls, a
/// small overlap so entities split across a chunk boundary still get full
/// context on one side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 3000,
            overlap_tokens: 50,
        }
    }
}

impl ChunkerConfig {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        debug_assert!(
            overlap_tokens < max_tokens,
            "overlap_tokens must be < max_tokens"
        );
        Self {
            max_tokens,
            overlap_tokens,
        }
    }
}

/// A single semantic chunk of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub number_tokens: usize,
}

/// Whitespace-delimited word count. A crude but deterministic token proxy —
/// good enough for packing decisions without pulling in a tokenizer model.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split text into sentences on `.`/`!`/`?` followed by whitespace or
/// end-of-string. Keeps the terminator attached to its sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'.' || c == b'!' || c == b'?' {
            let next_is_boundary = i + 1 >= bytes.len() || bytes[i + 1].is_ascii_whitespace();
            if next_is_boundary {
                let sentence = text[start..=i].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = i + 1;
            }
        }
        i += 1;
    }
    if start < bytes.len() {
        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail);
        }
    }
    sentences
}

/// Deterministic semantic chunker (spec §4.1).
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Segment by sentence; greedily pack sentences until adding the next
    /// would exceed `max_tokens`; emit chunk; seed the next chunk with the
    /// trailing sentences of the previous chunk whose cumulative token
    /// count is `<= overlap_tokens`.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let max_tokens = self.config.max_tokens;
        let overlap_tokens = self.config.overlap_tokens;

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_tokens = 0usize;
        let mut i = 0usize;

        while i < sentences.len() {
            let sentence = sentences[i];
            let sentence_tokens = count_tokens(sentence);

            if current.is_empty() {
                // A lone oversized sentence still forms its own chunk.
                current.push(sentence);
                current_tokens = sentence_tokens;
                i += 1;
                continue;
            }

            if current_tokens + sentence_tokens > max_tokens {
                chunks.push(Self::emit(&current, current_tokens));
                let (seed, seed_tokens) = Self::overlap_seed(&current, overlap_tokens);
                current = seed;
                current_tokens = seed_tokens;
                continue;
            }

            current.push(sentence);
            current_tokens += sentence_tokens;
            i += 1;
        }

        if !current.is_empty() {
            chunks.push(Self::emit(&current, current_tokens));
        }

        chunks
    }

    fn emit(sentences: &[&str], number_tokens: usize) -> Chunk {
        Chunk {
            text: sentences.join(" "),
            number_tokens,
        }
    }

    /// Trailing sentences of `chunk` whose cumulative token count stays
    /// within `overlap_tokens`, preserved in original order.
    fn overlap_seed<'a>(chunk: &[&'a str], overlap_tokens: usize) -> (Vec<&'a str>, usize) {
        if overlap_tokens == 0 {
            return (Vec::new(), 0);
        }
        let mut seed = Vec::new();
        let mut total = 0usize;
        for sentence in chunk.iter().rev() {
            let tokens = count_tokens(sentence);
            if total + tokens > overlap_tokens {
                break;
            }
            seed.push(*sentence);
            total += tokens;
        }
        seed.reverse();
        (seed, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_output() {
        let chunker = TextChunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n  ").is_empty());
    }

    #[test]
    fn single_short_sentence_is_one_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.chunk("A single short sentence.");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn no_chunk_exceeds_max_tokens_unless_one_sentence_does() {
        let config = ChunkerConfig::new(10, 2);
        let chunker = TextChunker::new(config);
        let text = "one two three four. five six seven eight. nine ten eleven twelve.";
        let chunks = chunker.chunk(text);
        for c in &chunks {
            assert!(c.number_tokens <= 10 || c.text.split_whitespace().count() == c.number_tokens);
        }
    }

    #[test]
    fn every_sentence_appears_in_some_chunk() {
        let config = ChunkerConfig::new(8, 2);
        let chunker = TextChunker::new(config);
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota kappa.";
        let chunks = chunker.chunk(text);
        let joined: String = chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>().join(" ");
        for sentence in ["Alpha beta gamma.", "Delta epsilon zeta.", "Eta theta iota kappa."] {
            assert!(joined.contains(sentence.trim_end_matches('.')));
        }
    }

    #[test]
    fn e1_ten_thousand_tokens_yields_four_chunks() {
        // Each "sentence" is 1000 tokens so the chunker packs 3 per chunk
        // (3000 max) plus whatever fits after overlap seeding.
        let words: Vec<String> = (0..1000).map(|i| format!("w{}", i)).collect();
        let sentence = format!("{}.", words.join(" "));
        let text = std::iter::repeat(sentence).take(10).collect::<Vec<_>>().join(" ");
        let config = ChunkerConfig::new(3000, 50);
        let chunker = TextChunker::new(config);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 4);
        for c in &chunks {
            assert!(c.number_tokens <= 3000);
        }
    }

    #[test]
    fn overlap_bound_respected() {
        let words: Vec<String> = (0..1000).map(|i| format!("w{}", i)).collect();
        let sentence = format!("{}.", words.join(" "));
        let text = std::iter::repeat(sentence).take(5).collect::<Vec<_>>().join(" ");
        let config = ChunkerConfig::new(3000, 50);
        let chunker = TextChunker::new(config);
        let chunks = chunker.chunk(&text);
        // every sentence is 1000 tokens, larger than overlap_tokens=50, so
        // no sentence can be reused across a boundary: consecutive chunks
        // share zero tokens here.
        assert!(chunks.len() >= 2);
    }
}
