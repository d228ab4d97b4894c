//! Splitting of long texts into independently translated fragments.

use crate::chain::ProviderChain;
use crate::normalize::normalize_language;
use crate::resolution::{ResolutionResult, Resolve};
use tracing::{debug, warn};

pub const CHUNKED_SERVICE: &str = "chunked";
/// Fragments are translated without each other's context
pub const CHUNKED_CONFIDENCE: u8 = 75;
pub const DEFAULT_MAX_LENGTH: usize = 450;
pub const DEFAULT_DELIMITER: &str = ". ";
const JOINER: &str = " ";

#[derive(Debug, Clone)]
pub struct Chunker {
    max_length: usize,
    delimiter: String,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH, DEFAULT_DELIMITER)
    }
}

impl Chunker {
    /// `max_length` is in characters and at least 1.
    pub fn new(max_length: usize, delimiter: impl Into<String>) -> Self {
        Self {
            max_length: max_length.max(1),
            delimiter: delimiter.into(),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn needs_chunking(&self, text: &str) -> bool {
        text.chars().count() > self.max_length
    }

    /// Split `text` into ordered fragments of at most `max_length` chars.
    ///
    /// Sentences (text up to and including the delimiter) are packed greedily;
    /// a sentence longer than the limit is hard-split by character count.
    /// Fragments are trimmed and never empty. Short text comes back whole.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if !self.needs_chunking(text) {
            return vec![text.to_string()];
        }

        let mut packed: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for unit in self.sentences(text) {
            let unit_len = unit.chars().count();
            if current_len > 0 && current_len + unit_len > self.max_length {
                packed.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push_str(unit);
            current_len += unit_len;
        }
        if current_len > 0 {
            packed.push(current);
        }

        packed
            .iter()
            .flat_map(|piece| self.hard_split(piece.trim()))
            .filter(|fragment| !fragment.is_empty())
            .collect()
    }

    fn sentences<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        if self.delimiter.is_empty() {
            Box::new(std::iter::once(text))
        } else {
            Box::new(text.split_inclusive(self.delimiter.as_str()))
        }
    }

    fn hard_split(&self, piece: &str) -> Vec<String> {
        if piece.chars().count() <= self.max_length {
            return vec![piece.to_string()];
        }
        let chars: Vec<char> = piece.chars().collect();
        chars
            .chunks(self.max_length)
            .map(|c| c.iter().collect::<String>().trim().to_string())
            .collect()
    }

    /// Translate `text`, chunking it when it exceeds the limit.
    ///
    /// Short text goes straight to `chain`. Long text is split and every
    /// fragment is resolved in order through `resolver` (cache included). The
    /// first failing fragment stops the run and fails the whole text.
    pub async fn translate_chunked<R>(
        &self,
        chain: &ProviderChain,
        resolver: &R,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> ResolutionResult
    where
        R: Resolve + ?Sized,
    {
        if !self.needs_chunking(text) {
            return chain.translate(text, source_language, target_language).await;
        }

        let fragments = self.chunk(text);
        let total = fragments.len();
        if fragments.is_empty() {
            return ResolutionResult::degraded(
                text,
                &normalize_language(source_language),
                &normalize_language(target_language),
                "Text has nothing to translate",
            );
        }
        debug!("Translating {} chars as {} chunks", text.chars().count(), total);

        let mut translated = Vec::with_capacity(total);
        for (i, fragment) in fragments.iter().enumerate() {
            let result = resolver
                .resolve(fragment, source_language, target_language)
                .await;
            if let Some(cause) = result.error {
                warn!("Chunk {}/{} failed, abandoning text", i + 1, total);
                return ResolutionResult::degraded(
                    text,
                    &normalize_language(source_language),
                    &normalize_language(target_language),
                    format!("Chunk {}/{} failed: {}", i + 1, total, cause),
                );
            }
            translated.push(result.translated_text);
        }

        ResolutionResult {
            translated_text: translated.join(JOINER),
            source_language: normalize_language(source_language),
            target_language: normalize_language(target_language),
            service: CHUNKED_SERVICE.to_string(),
            confidence: CHUNKED_CONFIDENCE,
            original_text: text.to_string(),
            cache_level: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Echoes fragments back upper-cased, optionally failing one of them
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl Resolve for Recorder {
        async fn resolve(&self, text: &str, source: &str, target: &str) -> ResolutionResult {
            let index = {
                let mut seen = self.seen.lock();
                seen.push(text.to_string());
                seen.len() - 1
            };
            if self.fail_on == Some(index) {
                return ResolutionResult::degraded(text, source, target, "provider down");
            }
            ResolutionResult {
                translated_text: text.to_uppercase(),
                source_language: source.to_string(),
                target_language: target.to_string(),
                service: "stub".to_string(),
                confidence: 90,
                original_text: text.to_string(),
                cache_level: None,
                error: None,
            }
        }
    }

    fn sentence(i: usize) -> String {
        format!("Sentence number {} has some words in it", i)
    }

    // ==================== chunk Tests ====================

    #[test]
    fn test_short_text_is_single_fragment() {
        let chunker = Chunker::default();
        assert_eq!(chunker.chunk("Hello. World."), vec!["Hello. World."]);
    }

    #[test]
    fn test_sentences_are_packed_up_to_limit() {
        let chunker = Chunker::new(30, ". ");
        let chunks = chunker.chunk("One two three. Four five six. Seven eight nine. Ten.");

        assert_eq!(
            chunks,
            vec!["One two three. Four five six.", "Seven eight nine. Ten."]
        );
    }

    #[test]
    fn test_long_sentence_is_hard_split() {
        let chunker = Chunker::new(10, ". ");
        let chunks = chunker.chunk("abcdefghijklmnopqrstuvwxy");

        assert_eq!(chunks, vec!["abcdefghij", "klmnopqrst", "uvwxy"]);
    }

    #[test]
    fn test_limit_counts_characters_not_bytes() {
        let chunker = Chunker::new(4, ". ");
        let chunks = chunker.chunk("வணக்கம்");

        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert_eq!(chunks.concat(), "வணக்கம்");
    }

    #[test]
    fn test_thousand_chars_make_at_least_three_fragments() {
        let text = (0..40).map(sentence).collect::<Vec<_>>().join(". ");
        let text = &text[..1000];
        let chunker = Chunker::new(450, ". ");

        let chunks = chunker.chunk(text);

        assert!(chunks.len() >= 3, "got {} chunks", chunks.len());
        assert!(chunks.iter().all(|c| c.chars().count() <= 450));
        assert!(chunks.iter().all(|c| !c.is_empty()));
        let rebuilt: String = chunks.concat().split_whitespace().collect();
        let original: String = text.split_whitespace().collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_empty_delimiter_falls_back_to_hard_split() {
        let chunker = Chunker::new(5, "");
        assert_eq!(chunker.chunk("aaaaabbbbbcc"), vec!["aaaaa", "bbbbb", "cc"]);
    }

    // ==================== translate_chunked Tests ====================

    #[tokio::test]
    async fn test_chunked_translation_reassembles_in_order() {
        let chunker = Chunker::new(30, ". ");
        let recorder = Recorder::default();
        let chain = ProviderChain::new(Vec::new());
        let text = "One two three. Four five six. Seven eight nine. Ten.";

        let result = chunker
            .translate_chunked(&chain, &recorder, text, "EN", "ta")
            .await;

        assert_eq!(
            result.translated_text,
            "ONE TWO THREE. FOUR FIVE SIX. SEVEN EIGHT NINE. TEN."
        );
        assert_eq!(result.service, "chunked");
        assert_eq!(result.confidence, 75);
        assert_eq!(result.source_language, "en");
        assert_eq!(result.original_text, text);
        assert!(result.error.is_none());
        assert_eq!(recorder.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_first_failing_chunk_stops_the_run() {
        let chunker = Chunker::new(10, ". ");
        let recorder = Recorder {
            fail_on: Some(1),
            ..Recorder::default()
        };
        let chain = ProviderChain::new(Vec::new());
        let text = "aaaa bbbb. cccc dddd. eeee ffff. gggg hhhh.";

        let result = chunker
            .translate_chunked(&chain, &recorder, text, "en", "ta")
            .await;

        assert!(result.is_error());
        assert_eq!(result.translated_text, text);
        assert_eq!(result.service, "none");
        assert_eq!(result.confidence, 0);
        assert!(result.error.unwrap().contains("Chunk 2/4 failed: provider down"));
        // Chunks after the failure are never resolved
        assert_eq!(recorder.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_short_text_goes_straight_to_chain() {
        let chunker = Chunker::default();
        let recorder = Recorder::default();
        let chain = ProviderChain::new(Vec::new());

        let result = chunker
            .translate_chunked(&chain, &recorder, "hello", "en", "ta")
            .await;

        // The empty chain answers, the resolver is never consulted
        assert!(result.is_error());
        assert!(recorder.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_long_blank_text_is_not_a_success() {
        let chunker = Chunker::new(10, ". ");
        let recorder = Recorder::default();
        let chain = ProviderChain::new(Vec::new());
        let text = " ".repeat(40);

        let result = chunker
            .translate_chunked(&chain, &recorder, &text, "en", "ta")
            .await;

        assert!(result.is_error());
        assert_eq!(result.service, "none");
        assert_eq!(result.confidence, 0);
        assert_eq!(result.translated_text, text);
        assert!(recorder.seen.lock().is_empty());
    }
}
