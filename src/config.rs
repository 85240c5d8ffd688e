use std::path::PathBuf;

/// Tuning and storage configuration consumed by the prediction
/// pipeline. None of these values change the shape of the public API,
/// only its behavior.
#[derive(Debug, Clone)]
pub struct Config {
    /// Raw text corpus the vocabulary and model are built from. When
    /// the file is missing a built-in fallback corpus is used instead.
    pub corpus_path: PathBuf,
    /// Where the fitted vocabulary is persisted.
    pub vocab_path: PathBuf,
    /// Where the trained model parameters are persisted.
    pub model_path: PathBuf,
    /// Upper bound on vocabulary size, reserved ids included. Words
    /// ranked below the cap collapse to the unknown sentinel.
    pub max_vocab_size: usize,
    /// Context window width consumed by the model.
    pub seq_len: usize,
    /// Width of the token embedding vectors.
    pub embedding_dim: usize,
    /// Width of the recurrent hidden state.
    pub hidden_dim: usize,
    /// Number of training passes over the pair set.
    pub epochs: usize,
    /// Mini-batch size during training.
    pub batch_size: usize,
    /// Adam learning rate.
    pub learning_rate: f32,
    /// Upper bound on words returned per completion; requests beyond it
    /// are clamped.
    pub max_predict_words: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("dataset.txt"),
            vocab_path: PathBuf::from("vocab.bin"),
            model_path: PathBuf::from("model.bin"),
            max_vocab_size: 5000,
            seq_len: 5,
            embedding_dim: 64,
            hidden_dim: 128,
            epochs: 3,
            batch_size: 64,
            learning_rate: 1e-3,
            max_predict_words: 10,
        }
    }
}
