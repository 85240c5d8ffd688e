use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Id of the padding marker. Distinct from the unknown-word sentinel:
/// padding means "no token here", not "a word we do not know".
pub const PAD_ID: usize = 0;
/// Id of the unknown/out-of-vocabulary sentinel.
pub const UNK_ID: usize = 1;

const PAD_TOKEN: &str = "<pad>";
const UNK_TOKEN: &str = "<unk>";
const RESERVED_TOKENS: usize = 2;

/// Characters stripped before splitting text into words, matching the
/// punctuation filter of the tokenizer the corpus was prepared for.
const FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n\r";

/// Errors raised while persisting or restoring a vocabulary artifact.
#[derive(Debug, Error)]
pub enum VocabError {
    /// Reading or writing the artifact failed.
    #[error("vocabulary i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The artifact bytes could not be (de)serialized.
    #[error("vocabulary serialization error: {0}")]
    Serde(#[from] bincode::Error),
}

/// Bijection between word surface forms and dense integer ids.
///
/// Ids `0` and `1` are reserved for the padding marker and the
/// out-of-vocabulary sentinel; real words occupy `2..len()`, ranked by
/// descending corpus frequency with ties broken by first occurrence.
/// Once persisted, id assignments never change for the lifetime of the
/// artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    words: Vec<String>,
    index: HashMap<String, usize>,
}

/// Splits raw text into lowercase words, stripping the punctuation
/// filter set first. Word order is preserved.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if FILTERS.contains(c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

impl Vocabulary {
    /// Fits a vocabulary on a corpus, keeping at most `max_size` ids in
    /// total (the two reserved slots included). Words beyond the cap
    /// collapse to the unknown sentinel at encode time.
    ///
    /// An empty corpus degenerates to the two reserved ids; this is a
    /// valid vocabulary, not an error.
    pub fn fit(corpus_text: &str, max_size: usize) -> Self {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for (position, word) in tokenize(corpus_text).into_iter().enumerate() {
            let entry = counts.entry(word).or_insert((0, position));
            entry.0 += 1;
        }

        // Explicit stable ranking: count descending, first occurrence
        // ascending. Never rely on map iteration order.
        let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

        let budget = max_size.saturating_sub(RESERVED_TOKENS);
        let mut words = Vec::with_capacity(RESERVED_TOKENS + budget.min(ranked.len()));
        words.push(PAD_TOKEN.to_string());
        words.push(UNK_TOKEN.to_string());
        words.extend(ranked.into_iter().take(budget).map(|(word, _)| word));

        let index = words
            .iter()
            .enumerate()
            .map(|(id, word)| (word.clone(), id))
            .collect();

        Self { words, index }
    }

    /// Loads the persisted vocabulary at `path` verbatim if it exists,
    /// guaranteeing id stability across restarts; otherwise fits one on
    /// `corpus_text`, persists it and returns it.
    pub fn build_or_load(
        path: &Path,
        corpus_text: &str,
        max_size: usize,
    ) -> Result<Self, VocabError> {
        if path.is_file() {
            return Self::load(path);
        }
        let vocab = Self::fit(corpus_text, max_size);
        vocab.save(path)?;
        Ok(vocab)
    }

    /// Persists the vocabulary via a temp-file write plus atomic rename.
    pub fn save(&self, path: &Path) -> Result<(), VocabError> {
        let bytes = bincode::serialize(self)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &bytes)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Restores a previously persisted vocabulary.
    pub fn load(path: &Path) -> Result<Self, VocabError> {
        let bytes = fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Total number of ids, reserved slots included. Never below 2.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Always false; present for API completeness.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// True when the vocabulary holds nothing beyond the reserved slots.
    pub fn is_degenerate(&self) -> bool {
        self.words.len() <= RESERVED_TOKENS
    }

    /// Id for a (already normalized) word, or the unknown sentinel.
    pub fn word_id(&self, word: &str) -> usize {
        self.index.get(word).copied().unwrap_or(UNK_ID)
    }

    /// Surface form for an id. Reserved ids and out-of-range ids have
    /// no surface form; emitting one to a caller would leak a sentinel.
    pub fn surface_word(&self, id: usize) -> Option<&str> {
        if id < RESERVED_TOKENS {
            return None;
        }
        self.words.get(id).map(String::as_str)
    }

    /// Maps raw text onto a token stream; unknown words become `UNK_ID`.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        tokenize(text)
            .iter()
            .map(|word| self.word_id(word))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_by_frequency_then_first_occurrence() {
        let vocab = Vocabulary::fit("b a a c b a", 100);
        assert_eq!(vocab.word_id("a"), 2);
        assert_eq!(vocab.word_id("b"), 3);
        assert_eq!(vocab.word_id("c"), 4);
        assert_eq!(vocab.len(), 5);
    }

    #[test]
    fn frequency_ties_break_by_first_occurrence() {
        let vocab = Vocabulary::fit("x y x y", 100);
        assert_eq!(vocab.word_id("x"), 2);
        assert_eq!(vocab.word_id("y"), 3);
    }

    #[test]
    fn cap_collapses_rare_words_to_unknown() {
        // Budget for two real words beyond the reserved slots.
        let vocab = Vocabulary::fit("a a a b b c d", 4);
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.word_id("a"), 2);
        assert_eq!(vocab.word_id("b"), 3);
        assert_eq!(vocab.word_id("c"), UNK_ID);
        assert_eq!(vocab.word_id("d"), UNK_ID);
    }

    #[test]
    fn empty_corpus_degenerates_to_reserved_ids() {
        let vocab = Vocabulary::fit("", 5000);
        assert_eq!(vocab.len(), 2);
        assert!(vocab.is_degenerate());
        assert_eq!(vocab.encode("anything at all"), vec![UNK_ID, UNK_ID, UNK_ID]);
    }

    #[test]
    fn tokenize_lowercases_and_strips_punctuation() {
        assert_eq!(
            tokenize("The quick, brown FOX."),
            vec!["the", "quick", "brown", "fox"]
        );
        assert_eq!(tokenize("  \t\n "), Vec::<String>::new());
    }

    #[test]
    fn reserved_ids_have_no_surface_form() {
        let vocab = Vocabulary::fit("hello world", 100);
        assert_eq!(vocab.surface_word(PAD_ID), None);
        assert_eq!(vocab.surface_word(UNK_ID), None);
        assert_eq!(vocab.surface_word(2), Some("hello"));
        assert_eq!(vocab.surface_word(999), None);
    }

    #[test]
    fn persisted_vocabulary_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.bin");
        let fitted = Vocabulary::fit("the quick brown fox the quick the", 100);
        fitted.save(&path).unwrap();

        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded, fitted);
        for word in ["the", "quick", "brown", "fox"] {
            assert_eq!(loaded.word_id(word), fitted.word_id(word));
        }
    }

    #[test]
    fn build_or_load_prefers_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.bin");
        let first = Vocabulary::build_or_load(&path, "alpha beta gamma", 100).unwrap();
        // A different corpus must not re-fit once the artifact exists.
        let second = Vocabulary::build_or_load(&path, "delta epsilon", 100).unwrap();
        assert_eq!(second, first);
        assert_eq!(second.word_id("delta"), UNK_ID);
    }
}
