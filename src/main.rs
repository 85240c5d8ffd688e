use nextword::{Config, Engine, EngineError};

use clap::Parser;
use std::path::PathBuf;

// --- Configuration Structs ---

#[derive(Parser, Debug, Clone)]
struct StorageOpts {
    #[clap(long, default_value = "dataset.txt", help = "Path to the training corpus file")]
    corpus: PathBuf,
    #[clap(long, default_value = "vocab.bin", help = "Path to load/save the vocabulary artifact")]
    vocab_path: PathBuf,
    #[clap(long, default_value = "model.bin", help = "Path to load/save the model artifact")]
    model_path: PathBuf,
}

#[derive(Parser, Debug, Clone)]
struct ModelOpts {
    #[clap(long, default_value = "5000", help = "Maximum vocabulary size, reserved ids included")]
    max_vocab: usize,
    #[clap(long, default_value = "5", help = "Context window width (tokens)")]
    seq_len: usize,
    #[clap(long, default_value = "64", help = "Dimension of token embeddings")]
    embedding_dim: usize,
    #[clap(long, default_value = "128", help = "Dimension of the recurrent hidden state")]
    hidden_dim: usize,
}

#[derive(Parser, Debug, Clone)]
struct TrainOpts {
    #[clap(long, default_value = "3", help = "Number of training epochs")]
    epochs: usize,
    #[clap(long, default_value = "64", help = "Training mini-batch size")]
    batch_size: usize,
    #[clap(long, default_value = "0.001", help = "Adam learning rate")]
    learning_rate: f32,
}

// --- CLI Commands ---

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
enum Cli {
    /// Build or load the artifacts, training a model if none is persisted
    Train {
        #[clap(flatten)]
        storage: StorageOpts,
        #[clap(flatten)]
        model: ModelOpts,
        #[clap(flatten)]
        train: TrainOpts,
    },
    /// Predict the next words following a prompt
    Complete {
        #[clap(flatten)]
        storage: StorageOpts,
        #[clap(flatten)]
        model: ModelOpts,
        #[clap(flatten)]
        train: TrainOpts,
        #[clap(long, help = "Prompt text to extend")]
        prompt: String,
        #[clap(long, default_value = "3", help = "Number of words to predict")]
        num_words: usize,
    },
}

fn build_config(storage: StorageOpts, model: ModelOpts, train: TrainOpts) -> Config {
    Config {
        corpus_path: storage.corpus,
        vocab_path: storage.vocab_path,
        model_path: storage.model_path,
        max_vocab_size: model.max_vocab,
        seq_len: model.seq_len,
        embedding_dim: model.embedding_dim,
        hidden_dim: model.hidden_dim,
        epochs: train.epochs,
        batch_size: train.batch_size,
        learning_rate: train.learning_rate,
        ..Config::default()
    }
}

fn main() -> Result<(), EngineError> {
    match Cli::parse() {
        Cli::Train { storage, model, train } => {
            let engine = Engine::bootstrap(build_config(storage, model, train))?;
            println!(
                "Ready: vocabulary of {} ids, model with {} parameters",
                engine.vocabulary().len(),
                engine.model().num_params()
            );
        }
        Cli::Complete {
            storage,
            model,
            train,
            prompt,
            num_words,
        } => {
            let engine = Engine::bootstrap(build_config(storage, model, train))?;
            let result = engine.complete(&prompt, num_words)?;
            if result.words.is_empty() {
                println!("{} (no prediction)", prompt);
            } else {
                println!("{} {}", prompt, result.completion);
            }
        }
    }
    Ok(())
}
