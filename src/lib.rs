#![warn(missing_docs)]

//! # nextword
//!
//! `nextword` is a minimal Rust library for training and serving a
//! statistical next-word prediction model over a fixed text corpus.
//!
//! The pipeline: raw corpus text is fitted into a capped, frequency-ranked
//! [`Vocabulary`]; the encoded token stream is cut into fixed-width
//! context/target pairs; a small recurrent [`NextWordModel`] is trained on
//! them (or reloaded from a persisted artifact, first write wins); and a
//! greedy autoregressive decoder turns single-step inference into
//! multi-word completions. The [`Engine`] ties it together as an
//! application context built once at startup and shared by request
//! handlers.
//!
//! ## Example
//!
//! ```no_run
//! use nextword::{Config, Engine};
//!
//! # fn main() -> Result<(), nextword::EngineError> {
//! let engine = Engine::bootstrap(Config::default())?;
//! assert!(engine.health());
//!
//! let result = engine.complete("the quick brown", 3)?;
//! println!("{}", result.completion);
//! # Ok(())
//! # }
//! ```

/// Tuning and artifact-path configuration with documented defaults.
pub mod config;
/// Fixed-window extraction of (context, target) training pairs.
pub mod data;
/// Greedy autoregressive decoding over the model's one-step inference.
pub mod decode;
/// The application context: startup orchestration, train-or-reuse, and
/// the request-facing completion API.
pub mod engine;
/// Numeric kernels: softmax, argmax, gradient clipping.
pub mod funcs;
/// The recurrent sequence model: inference, training, persistence.
pub mod model;
/// Adam parameter updates.
pub mod optimizer;
/// Word-level vocabulary with reserved padding and unknown ids.
pub mod vocab;

pub use config::Config;
pub use data::{make_pairs, TrainingPair};
pub use decode::greedy_complete;
pub use engine::{ensure_model_ready, Completion, Engine, EngineError, FALLBACK_CORPUS};
pub use model::{ModelError, NextWordModel};
pub use vocab::{VocabError, Vocabulary, PAD_ID, UNK_ID};
