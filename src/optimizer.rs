use ndarray::Array2;

const DEFAULT_EPSILON: f32 = 1e-8;

/// Adam optimizer state for one parameter matrix.
///
/// Each trainable matrix owns its own `Adam` instance holding the first
/// and second moment estimates; the step counter drives bias correction.
/// Reference: "Adam: A Method for Stochastic Optimization"
/// (https://arxiv.org/abs/1412.6980).
#[derive(Debug, Clone)]
pub struct Adam {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: usize,
    m: Array2<f32>,
    v: Array2<f32>,
}

impl Adam {
    /// Creates an optimizer for a parameter of the given shape, with the
    /// usual defaults (beta1 0.9, beta2 0.999, epsilon 1e-8).
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: DEFAULT_EPSILON,
            t: 0,
            m: Array2::zeros(shape),
            v: Array2::zeros(shape),
        }
    }

    /// Applies one bias-corrected Adam update to `params` in place.
    ///
    /// Mismatched shapes or a non-positive learning rate leave the
    /// parameters untouched.
    pub fn step(&mut self, params: &mut Array2<f32>, grads: &Array2<f32>, learning_rate: f32) {
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return;
        }
        if params.raw_dim() != grads.raw_dim() || params.raw_dim() != self.m.raw_dim() {
            return;
        }

        self.t = self.t.saturating_add(1);

        // m = b1*m + (1-b1)*g ; v = b2*v + (1-b2)*g^2
        self.m = &self.m * self.beta1 + grads * (1.0 - self.beta1);
        let grads_sq = grads.mapv(|g| g * g);
        self.v = &self.v * self.beta2 + grads_sq * (1.0 - self.beta2);

        let t = self.t as i32;
        let correction1 = (1.0 - self.beta1.powi(t)).max(1e-12);
        let correction2 = (1.0 - self.beta2.powi(t)).max(1e-12);

        let m_hat = self.m.mapv(|m| m / correction1);
        let v_hat = self.v.mapv(|v| v / correction2);

        let update = m_hat / v_hat.mapv(|v| v.sqrt() + self.epsilon);
        *params = &*params - &(update * learning_rate);
    }

    /// Number of updates applied so far.
    pub fn steps_taken(&self) -> usize {
        self.t
    }
}
