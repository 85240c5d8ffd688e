use crate::vocab::Vocabulary;

/// One supervised example: a fixed-width context window and the id of
/// the token that immediately follows it in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPair {
    /// Exactly `seq_len` token ids of left context.
    pub context: Vec<usize>,
    /// The id the model should predict after the context.
    pub target: usize,
}

/// Slides a window of `seq_len` ids over the encoded corpus and emits
/// one pair per position `i >= seq_len`.
///
/// Pure and deterministic: the same vocabulary and text always yield the
/// identical pair sequence. A stream of `L` tokens yields exactly
/// `max(0, L - seq_len)` pairs; a corpus too short to fill a single
/// window yields none.
pub fn make_pairs(vocab: &Vocabulary, corpus_text: &str, seq_len: usize) -> Vec<TrainingPair> {
    let tokens = vocab.encode(corpus_text);
    if tokens.len() <= seq_len {
        return Vec::new();
    }
    (seq_len..tokens.len())
        .map(|i| TrainingPair {
            context: tokens[i - seq_len..i].to_vec(),
            target: tokens[i],
        })
        .collect()
}
