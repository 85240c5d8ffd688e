use crate::funcs::argmax;
use crate::model::{ModelError, NextWordModel};
use crate::vocab::{Vocabulary, PAD_ID};

/// Builds the context window for the next prediction: the last
/// `seq_len` ids of the stream, left-padded with the padding marker
/// when the stream is shorter than the window.
fn pad_window(stream: &[usize], seq_len: usize) -> Vec<usize> {
    let mut window = vec![PAD_ID; seq_len];
    let tail = stream.len().min(seq_len);
    window[seq_len - tail..].copy_from_slice(&stream[stream.len() - tail..]);
    window
}

/// Extends a prompt by up to `num_words` words through repeated greedy
/// single-step inference.
///
/// Each round takes the argmax of the model's distribution (ties break
/// toward the lowest id) and feeds the chosen id back into the stream.
/// The loop stops early as soon as the chosen id has no surface word —
/// the padding marker, the unknown sentinel, or an id past the
/// vocabulary — so sentinels are never emitted to the caller. A partial
/// or empty result is a valid outcome, not an error.
///
/// Padded windows are a best-effort approximation for short prompts:
/// training never pads, so the padding embedding row is only ever seen
/// here.
pub fn greedy_complete(
    vocab: &Vocabulary,
    model: &NextWordModel,
    prompt: &str,
    num_words: usize,
) -> Result<Vec<String>, ModelError> {
    let mut stream = vocab.encode(prompt);
    let seq_len = model.seq_len();

    let mut words = Vec::new();
    for _ in 0..num_words {
        let window = pad_window(&stream, seq_len);
        let probs = model.infer(&window)?;
        let next_id = match argmax(&probs) {
            Some(id) => id,
            None => break,
        };
        match vocab.surface_word(next_id) {
            Some(word) => {
                words.push(word.to_string());
                stream.push(next_id);
            }
            None => break,
        }
    }
    Ok(words)
}
