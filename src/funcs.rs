use ndarray::Array2;

/// Row-wise numerically stable softmax.
///
/// Each row is shifted by its maximum before exponentiation so large
/// logits cannot overflow. Rows of an all-`-inf` or empty input come
/// back as zeros rather than NaN.
pub fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut out = logits.clone();
    for mut row in out.rows_mut() {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !max.is_finite() {
            row.fill(0.0);
            continue;
        }
        row.mapv_inplace(|x| (x - max).exp());
        let sum: f32 = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|x| x / sum);
        }
    }
    out
}

/// Index of the maximum value; ties resolve to the lowest index so
/// greedy decoding stays deterministic. `None` only for empty input.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Clamps every gradient element into `[-limit, limit]`.
pub fn clip_gradients(grads: &mut Array2<f32>, limit: f32) {
    grads.mapv_inplace(|g| g.clamp(-limit, limit));
}
