use crate::config::Config;
use crate::data::make_pairs;
use crate::decode::greedy_complete;
use crate::model::{ModelError, NextWordModel};
use crate::vocab::{VocabError, Vocabulary};

use std::fs;
use std::path::Path;
use thiserror::Error;

/// Built-in corpus used when the configured corpus file is absent, so
/// startup always succeeds.
pub const FALLBACK_CORPUS: &str = "the quick brown fox jumps over the lazy dog. \
    the quick brown cat sleeps on the warm mat. \
    the smart student studies hard and learns quickly. ";

/// Errors surfaced by the engine. Startup faults propagate out of
/// [`Engine::bootstrap`]; request faults come back from
/// [`Engine::complete`] as typed values.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Vocabulary artifact handling failed.
    #[error("vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    /// Model training, inference or artifact handling failed.
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    /// The prompt held no text; rejected before any inference runs.
    #[error("prompt text must not be empty")]
    EmptyPrompt,
}

/// An ordered next-word prediction plus its space-joined rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Predicted words, in order. May be empty.
    pub words: Vec<String>,
    /// The words joined by single spaces.
    pub completion: String,
}

/// Reads the corpus, substituting the built-in fallback when the file
/// cannot be read.
pub fn read_corpus(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => {
            eprintln!(
                "Warning: corpus file {:?} not found, using built-in fallback corpus",
                path
            );
            FALLBACK_CORPUS.to_string()
        }
    }
}

/// Train-or-reuse decision, run once at startup.
///
/// A persisted model artifact always wins, even if the corpus has since
/// changed — first write wins, this is not a cache with invalidation.
/// Without an artifact a fresh model is trained (when the corpus yields
/// any pairs) and persisted. A corpus too short to form a single pair
/// produces an untrained but usable model: availability over prediction
/// quality in the degenerate case.
pub fn ensure_model_ready(
    config: &Config,
    vocab: &Vocabulary,
    corpus_text: &str,
) -> Result<NextWordModel, ModelError> {
    if config.model_path.is_file() {
        println!("Loading model artifact from {:?}", config.model_path);
        return NextWordModel::load(&config.model_path, vocab.len());
    }

    let mut rng = rand::thread_rng();
    let mut model = NextWordModel::new(
        &mut rng,
        vocab.len(),
        config.embedding_dim,
        config.hidden_dim,
        config.seq_len,
    );

    let pairs = make_pairs(vocab, corpus_text, config.seq_len);
    if pairs.is_empty() {
        println!("Corpus yields no training pairs; serving an untrained model");
    } else {
        println!(
            "Training on {} pairs ({} epochs, batch size {})",
            pairs.len(),
            config.epochs,
            config.batch_size
        );
        model.fit(&pairs, config.epochs, config.batch_size, config.learning_rate)?;
    }
    model.save(&config.model_path)?;
    Ok(model)
}

/// Application context holding the loaded vocabulary and model.
///
/// Constructed once at startup and passed into request handlers; all
/// artifact loading and training happens inside [`Engine::bootstrap`],
/// before any request is served, so [`Engine::complete`] only ever
/// reads shared state and is safe to call concurrently.
pub struct Engine {
    config: Config,
    vocab: Vocabulary,
    model: NextWordModel,
    ready: bool,
}

impl Engine {
    /// Builds or loads all artifacts and returns a ready engine.
    pub fn bootstrap(config: Config) -> Result<Self, EngineError> {
        let corpus = read_corpus(&config.corpus_path);
        let vocab = Vocabulary::build_or_load(&config.vocab_path, &corpus, config.max_vocab_size)?;
        let model = ensure_model_ready(&config, &vocab, &corpus)?;
        Ok(Self {
            config,
            vocab,
            model,
            ready: true,
        })
    }

    /// Predicts up to `num_words` words following `prompt`.
    ///
    /// An empty prompt is rejected before inference; `num_words` is
    /// clamped into `[1, max_predict_words]`. An empty word list is a
    /// valid result (the first greedy pick was a sentinel).
    pub fn complete(&self, prompt: &str, num_words: usize) -> Result<Completion, EngineError> {
        if prompt.trim().is_empty() {
            return Err(EngineError::EmptyPrompt);
        }
        let num_words = num_words.clamp(1, self.config.max_predict_words);
        let words = greedy_complete(&self.vocab, &self.model, prompt, num_words)?;
        let completion = words.join(" ");
        Ok(Completion { words, completion })
    }

    /// Readiness flag: true once bootstrap has completed.
    pub fn health(&self) -> bool {
        self.ready
    }

    /// The loaded vocabulary.
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// The loaded model.
    pub fn model(&self) -> &NextWordModel {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &Path) -> Config {
        Config {
            corpus_path: dir.join("dataset.txt"),
            vocab_path: dir.join("vocab.bin"),
            model_path: dir.join("model.bin"),
            max_vocab_size: 100,
            seq_len: 3,
            embedding_dim: 8,
            hidden_dim: 8,
            epochs: 2,
            batch_size: 4,
            learning_rate: 1e-3,
            max_predict_words: 10,
        }
    }

    #[test]
    fn missing_corpus_falls_back_and_still_boots() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        // No dataset.txt written: the fallback corpus must kick in.
        let engine = Engine::bootstrap(config).unwrap();
        assert!(engine.health());
        assert!(engine.vocabulary().len() > 2);
        // "fox" appears in the fallback corpus, so it must be a real id.
        assert_ne!(engine.vocabulary().word_id("fox"), crate::vocab::UNK_ID);
    }

    #[test]
    fn second_startup_reuses_the_artifact_even_when_the_corpus_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        fs::write(&config.corpus_path, "the cat sat on the mat and the cat slept").unwrap();

        let first = Engine::bootstrap(config.clone()).unwrap();
        // Rewrite the corpus: a second bootstrap must load, not retrain.
        fs::write(&config.corpus_path, "completely different words entirely here").unwrap();
        let second = Engine::bootstrap(config).unwrap();

        assert_eq!(second.model, first.model);
        assert_eq!(second.vocab, first.vocab);
        assert_eq!(second.vocabulary().word_id("completely"), crate::vocab::UNK_ID);
    }

    #[test]
    fn ensure_model_ready_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let corpus = "one two three four five six seven eight nine ten";
        let vocab = Vocabulary::fit(corpus, config.max_vocab_size);

        let first = ensure_model_ready(&config, &vocab, corpus).unwrap();
        let second = ensure_model_ready(&config, &vocab, corpus).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn empty_prompt_is_rejected_before_inference() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::bootstrap(test_config(dir.path())).unwrap();
        assert!(matches!(engine.complete("", 3), Err(EngineError::EmptyPrompt)));
        assert!(matches!(
            engine.complete("   \t ", 3),
            Err(EngineError::EmptyPrompt)
        ));
    }

    #[test]
    fn num_words_is_clamped_to_the_configured_maximum() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::bootstrap(test_config(dir.path())).unwrap();
        let result = engine.complete("the quick brown", 500).unwrap();
        assert!(result.words.len() <= 10);
    }

    #[test]
    fn completion_joins_words_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::bootstrap(test_config(dir.path())).unwrap();
        let result = engine.complete("the quick brown", 3).unwrap();
        assert!(result.words.len() <= 3);
        assert_eq!(result.completion, result.words.join(" "));
    }
}
