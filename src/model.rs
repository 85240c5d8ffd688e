use crate::data::TrainingPair;
use crate::funcs::{clip_gradients, softmax_rows};
use crate::optimizer::Adam;

use ndarray::{Array2, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::AddAssign;
use std::path::Path;
use thiserror::Error;

const CHECKPOINT_MAGIC: &str = "NEXTWORD_MODEL";
const CHECKPOINT_VERSION: u32 = 1;
const GRADIENT_CLIP: f32 = 5.0;

/// Errors from model inference, training or persistence.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Reading or writing the artifact failed.
    #[error("model i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The artifact bytes could not be (de)serialized.
    #[error("model serialization error: {0}")]
    Serde(#[from] bincode::Error),
    /// The persisted artifact was built against a different vocabulary.
    /// Loading it anyway would produce nonsensical predictions, so this
    /// is surfaced immediately instead.
    #[error("model artifact was trained with vocabulary size {found}, but the loaded vocabulary has size {expected}")]
    ShapeMismatch {
        /// Size of the currently loaded vocabulary.
        expected: usize,
        /// Size recorded in the artifact.
        found: usize,
    },
    /// The artifact is structurally invalid (bad magic, unsupported
    /// version, or internally inconsistent tensor shapes).
    #[error("corrupt model artifact: {0}")]
    BadCheckpoint(String),
    /// A context window of the wrong width was supplied.
    #[error("context window must hold exactly {expected} token ids, got {found}")]
    InvalidContext {
        /// The model's configured window width.
        expected: usize,
        /// Width of the supplied window.
        found: usize,
    },
    /// A token id outside the embedding table was supplied.
    #[error("token id {id} out of range for vocabulary of size {vocab_size}")]
    InvalidToken {
        /// The offending id.
        id: usize,
        /// Number of rows in the embedding table.
        vocab_size: usize,
    },
}

/// A next-token sequence model: embedding lookup, a single tanh
/// recurrence over the fixed context window, and a linear projection
/// plus softmax over the full vocabulary.
///
/// Only the final hidden state feeds the projection, so the model emits
/// one distribution per window. Parameters are mutated exclusively by
/// [`NextWordModel::fit`]; [`NextWordModel::infer`] takes `&self` and is
/// safe to call from concurrent readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextWordModel {
    vocab_size: usize,
    embedding_dim: usize,
    hidden_dim: usize,
    seq_len: usize,
    embedding: Array2<f32>, // [vocab_size, embedding_dim]
    w_xh: Array2<f32>,      // [embedding_dim, hidden_dim]
    w_hh: Array2<f32>,      // [hidden_dim, hidden_dim]
    b_h: Array2<f32>,       // [1, hidden_dim]
    w_ho: Array2<f32>,      // [hidden_dim, vocab_size]
    b_o: Array2<f32>,       // [1, vocab_size]
}

/// Persisted form of the model: the parameters plus everything needed
/// to validate them before use.
#[derive(Serialize, Deserialize)]
struct Checkpoint {
    magic: String,
    version: u32,
    model: NextWordModel,
}

fn randn<R: Rng>(rng: &mut R, shape: (usize, usize), fan_in: usize) -> Array2<f32> {
    let std = (2.0 / (fan_in as f32).max(1.0)).sqrt();
    Array2::from_shape_fn(shape, |_| {
        let sample: f32 = rng.sample(StandardNormal);
        sample * std
    })
}

/// Per-parameter gradient accumulator with the same shapes as the model.
struct Gradients {
    embedding: Array2<f32>,
    w_xh: Array2<f32>,
    w_hh: Array2<f32>,
    b_h: Array2<f32>,
    w_ho: Array2<f32>,
    b_o: Array2<f32>,
}

impl Gradients {
    fn zeros(model: &NextWordModel) -> Self {
        Self {
            embedding: Array2::zeros(model.embedding.dim()),
            w_xh: Array2::zeros(model.w_xh.dim()),
            w_hh: Array2::zeros(model.w_hh.dim()),
            b_h: Array2::zeros(model.b_h.dim()),
            w_ho: Array2::zeros(model.w_ho.dim()),
            b_o: Array2::zeros(model.b_o.dim()),
        }
    }

    fn accumulate(&mut self, other: &Gradients) {
        self.embedding += &other.embedding;
        self.w_xh += &other.w_xh;
        self.w_hh += &other.w_hh;
        self.b_h += &other.b_h;
        self.w_ho += &other.w_ho;
        self.b_o += &other.b_o;
    }

    fn scale(&mut self, factor: f32) {
        for grads in [
            &mut self.embedding,
            &mut self.w_xh,
            &mut self.w_hh,
            &mut self.b_h,
            &mut self.w_ho,
            &mut self.b_o,
        ] {
            grads.mapv_inplace(|g| g * factor);
        }
    }

    fn clip(&mut self, limit: f32) {
        for grads in [
            &mut self.embedding,
            &mut self.w_xh,
            &mut self.w_hh,
            &mut self.b_h,
            &mut self.w_ho,
            &mut self.b_o,
        ] {
            clip_gradients(grads, limit);
        }
    }
}

impl NextWordModel {
    /// Creates a model with Normal-initialized weights scaled by fan-in
    /// and zeroed biases.
    pub fn new<R: Rng>(
        rng: &mut R,
        vocab_size: usize,
        embedding_dim: usize,
        hidden_dim: usize,
        seq_len: usize,
    ) -> Self {
        Self {
            vocab_size,
            embedding_dim,
            hidden_dim,
            seq_len,
            embedding: randn(rng, (vocab_size, embedding_dim), vocab_size),
            w_xh: randn(rng, (embedding_dim, hidden_dim), embedding_dim),
            w_hh: randn(rng, (hidden_dim, hidden_dim), hidden_dim),
            b_h: Array2::zeros((1, hidden_dim)),
            w_ho: randn(rng, (hidden_dim, vocab_size), hidden_dim),
            b_o: Array2::zeros((1, vocab_size)),
        }
    }

    /// Number of vocabulary ids the model was shaped for.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Width of the context window the model consumes.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Total number of trainable parameters.
    pub fn num_params(&self) -> usize {
        self.embedding.len()
            + self.w_xh.len()
            + self.w_hh.len()
            + self.b_h.len()
            + self.w_ho.len()
            + self.b_o.len()
    }

    fn check_window(&self, window: &[usize]) -> Result<(), ModelError> {
        if window.len() != self.seq_len {
            return Err(ModelError::InvalidContext {
                expected: self.seq_len,
                found: window.len(),
            });
        }
        for &id in window {
            if id >= self.vocab_size {
                return Err(ModelError::InvalidToken {
                    id,
                    vocab_size: self.vocab_size,
                });
            }
        }
        Ok(())
    }

    /// Runs the recurrence over one window, returning the hidden state
    /// of every step and the output distribution.
    fn run_window(&self, window: &[usize]) -> Result<(Vec<Array2<f32>>, Array2<f32>), ModelError> {
        self.check_window(window)?;

        let mut hidden = Array2::<f32>::zeros((1, self.hidden_dim));
        let mut states = Vec::with_capacity(window.len());
        for &id in window {
            let x = self.embedding.row(id).insert_axis(Axis(0));
            let pre = x.dot(&self.w_xh) + hidden.dot(&self.w_hh) + &self.b_h;
            hidden = pre.mapv(f32::tanh);
            states.push(hidden.clone());
        }

        let logits = hidden.dot(&self.w_ho) + &self.b_o;
        let probs = softmax_rows(&logits);
        Ok((states, probs))
    }

    /// Probability distribution over the next token id, given exactly
    /// `seq_len` ids of left context. Dense vector of length
    /// `vocab_size`, summing to 1. Side-effect free.
    pub fn infer(&self, window: &[usize]) -> Result<Vec<f32>, ModelError> {
        let (_, probs) = self.run_window(window)?;
        Ok(probs.row(0).to_vec())
    }

    /// Full backpropagation through time for a single pair against the
    /// current parameter snapshot. Returns the gradients and the
    /// cross-entropy loss.
    fn backprop(&self, pair: &TrainingPair) -> Result<(Gradients, f32), ModelError> {
        if pair.target >= self.vocab_size {
            return Err(ModelError::InvalidToken {
                id: pair.target,
                vocab_size: self.vocab_size,
            });
        }
        let (states, probs) = self.run_window(&pair.context)?;
        let loss = -probs[[0, pair.target]].max(1e-12).ln();

        let mut grads = Gradients::zeros(self);
        let h_zero = Array2::<f32>::zeros((1, self.hidden_dim));

        // Output layer: dL/dlogits = probs - onehot(target).
        let mut d_logits = probs;
        d_logits[[0, pair.target]] -= 1.0;

        let last = states.last().unwrap_or(&h_zero);
        grads.w_ho = last.t().dot(&d_logits);
        grads.b_o = d_logits.clone();

        let mut d_hidden = d_logits.dot(&self.w_ho.t());

        for t in (0..pair.context.len()).rev() {
            let h_t = &states[t];
            // tanh' = 1 - h^2
            let d_pre = &d_hidden * &h_t.mapv(|h| 1.0 - h * h);

            let h_prev = if t == 0 { &h_zero } else { &states[t - 1] };
            grads.w_hh += &h_prev.t().dot(&d_pre);

            let id = pair.context[t];
            let x = self.embedding.row(id).insert_axis(Axis(0));
            grads.w_xh += &x.t().dot(&d_pre);
            grads.b_h += &d_pre;

            let d_x = d_pre.dot(&self.w_xh.t());
            grads.embedding.row_mut(id).add_assign(&d_x.row(0));

            d_hidden = d_pre.dot(&self.w_hh.t());
        }

        Ok((grads, loss))
    }

    /// Trains on the pair set for a bounded number of epochs, processing
    /// mini-batches of `batch_size`. Per-example gradients inside a
    /// batch are computed in parallel against the frozen snapshot, then
    /// averaged, clipped and applied with Adam.
    ///
    /// Returns the mean loss of every epoch. Convergence is not
    /// guaranteed; an empty pair set or zero epochs is a no-op.
    pub fn fit(
        &mut self,
        pairs: &[TrainingPair],
        epochs: usize,
        batch_size: usize,
        learning_rate: f32,
    ) -> Result<Vec<f32>, ModelError> {
        if pairs.is_empty() || epochs == 0 {
            return Ok(Vec::new());
        }
        let batch_size = batch_size.max(1);

        let mut opt_embedding = Adam::new(self.embedding.dim());
        let mut opt_w_xh = Adam::new(self.w_xh.dim());
        let mut opt_w_hh = Adam::new(self.w_hh.dim());
        let mut opt_b_h = Adam::new(self.b_h.dim());
        let mut opt_w_ho = Adam::new(self.w_ho.dim());
        let mut opt_b_o = Adam::new(self.b_o.dim());

        let mut epoch_losses = Vec::with_capacity(epochs);
        for epoch in 0..epochs {
            let mut total_loss = 0.0f32;

            for batch in pairs.chunks(batch_size) {
                let results: Vec<(Gradients, f32)> = batch
                    .par_iter()
                    .map(|pair| self.backprop(pair))
                    .collect::<Result<_, ModelError>>()?;

                let mut batch_grads = Gradients::zeros(self);
                for (grads, loss) in &results {
                    batch_grads.accumulate(grads);
                    total_loss += *loss;
                }
                batch_grads.scale(1.0 / results.len() as f32);
                batch_grads.clip(GRADIENT_CLIP);

                opt_embedding.step(&mut self.embedding, &batch_grads.embedding, learning_rate);
                opt_w_xh.step(&mut self.w_xh, &batch_grads.w_xh, learning_rate);
                opt_w_hh.step(&mut self.w_hh, &batch_grads.w_hh, learning_rate);
                opt_b_h.step(&mut self.b_h, &batch_grads.b_h, learning_rate);
                opt_w_ho.step(&mut self.w_ho, &batch_grads.w_ho, learning_rate);
                opt_b_o.step(&mut self.b_o, &batch_grads.b_o, learning_rate);
            }

            let mean_loss = total_loss / pairs.len() as f32;
            println!("Epoch {}/{}: loss {:.4}", epoch + 1, epochs, mean_loss);
            epoch_losses.push(mean_loss);
        }

        Ok(epoch_losses)
    }

    fn shapes_consistent(&self) -> bool {
        self.embedding.dim() == (self.vocab_size, self.embedding_dim)
            && self.w_xh.dim() == (self.embedding_dim, self.hidden_dim)
            && self.w_hh.dim() == (self.hidden_dim, self.hidden_dim)
            && self.b_h.dim() == (1, self.hidden_dim)
            && self.w_ho.dim() == (self.hidden_dim, self.vocab_size)
            && self.b_o.dim() == (1, self.vocab_size)
    }

    /// Persists parameters and shape hyperparameters as one artifact,
    /// via a temp-file write plus atomic rename.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let checkpoint = Checkpoint {
            magic: CHECKPOINT_MAGIC.to_string(),
            version: CHECKPOINT_VERSION,
            model: self.clone(),
        };
        let bytes = bincode::serialize(&checkpoint)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &bytes)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Restores a persisted model, failing fast if the artifact does not
    /// match `expected_vocab_size` or is structurally invalid.
    pub fn load(path: &Path, expected_vocab_size: usize) -> Result<Self, ModelError> {
        let bytes = fs::read(path)?;
        let checkpoint: Checkpoint = bincode::deserialize(&bytes)?;

        if checkpoint.magic != CHECKPOINT_MAGIC {
            return Err(ModelError::BadCheckpoint("magic string mismatch".into()));
        }
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(ModelError::BadCheckpoint(format!(
                "unsupported artifact version {}",
                checkpoint.version
            )));
        }
        if !checkpoint.model.shapes_consistent() {
            return Err(ModelError::BadCheckpoint(
                "tensor shapes inconsistent with recorded hyperparameters".into(),
            ));
        }
        if checkpoint.model.vocab_size != expected_vocab_size {
            return Err(ModelError::ShapeMismatch {
                expected: expected_vocab_size,
                found: checkpoint.model.vocab_size,
            });
        }
        Ok(checkpoint.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::make_pairs;
    use crate::vocab::Vocabulary;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn toy_model(vocab_size: usize, seq_len: usize) -> NextWordModel {
        let mut rng = StdRng::seed_from_u64(7);
        NextWordModel::new(&mut rng, vocab_size, 8, 8, seq_len)
    }

    #[test]
    fn infer_returns_a_distribution() {
        let model = toy_model(6, 3);
        let probs = model.infer(&[2, 3, 4]).unwrap();
        assert_eq!(probs.len(), 6);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs.iter().all(|p| p.is_finite() && *p >= 0.0));
    }

    #[test]
    fn infer_is_deterministic() {
        let model = toy_model(6, 3);
        assert_eq!(
            model.infer(&[2, 3, 4]).unwrap(),
            model.infer(&[2, 3, 4]).unwrap()
        );
    }

    #[test]
    fn infer_rejects_wrong_window_width() {
        let model = toy_model(6, 3);
        assert!(matches!(
            model.infer(&[2, 3]),
            Err(ModelError::InvalidContext {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn infer_rejects_out_of_range_ids() {
        let model = toy_model(6, 3);
        assert!(matches!(
            model.infer(&[2, 3, 99]),
            Err(ModelError::InvalidToken { id: 99, .. })
        ));
    }

    #[test]
    fn fit_loss_is_finite_and_does_not_increase_on_a_toy_corpus() {
        let corpus = "a b a b a b a b a b a b a b a b a b a b";
        let vocab = Vocabulary::fit(corpus, 100);
        let pairs = make_pairs(&vocab, corpus, 2);
        assert!(!pairs.is_empty());

        let mut model = toy_model(vocab.len(), 2);
        let losses = model.fit(&pairs, 25, 6, 0.01).unwrap();

        assert_eq!(losses.len(), 25);
        assert!(losses.iter().all(|l| l.is_finite()));
        assert!(losses[losses.len() - 1] <= losses[0]);
    }

    #[test]
    fn fit_with_no_pairs_is_a_no_op() {
        let mut model = toy_model(6, 3);
        let before = model.clone();
        let losses = model.fit(&[], 5, 4, 0.01).unwrap();
        assert!(losses.is_empty());
        assert_eq!(model, before);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let model = toy_model(6, 3);
        model.save(&path).unwrap();

        let loaded = NextWordModel::load(&path, 6).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(
            loaded.infer(&[2, 3, 4]).unwrap(),
            model.infer(&[2, 3, 4]).unwrap()
        );
    }

    #[test]
    fn load_fails_fast_on_vocabulary_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        toy_model(6, 3).save(&path).unwrap();

        assert!(matches!(
            NextWordModel::load(&path, 10),
            Err(ModelError::ShapeMismatch {
                expected: 10,
                found: 6
            })
        ));
    }

    #[test]
    fn load_rejects_garbage_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"not a model artifact").unwrap();
        assert!(NextWordModel::load(&path, 6).is_err());
    }
}
