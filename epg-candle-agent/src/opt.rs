//! Clipped gradient steps over a group of variables.
use anyhow::Result;
use candle_core::{backprop::GradStore, Var};

/// Plain gradient descent with per-element gradient clipping.
///
/// The learning rate is supplied per step; the inner loop decays it between
/// mini-batches, so it is not part of the optimizer state.
pub struct ClippedSgd {
    vars: Vec<Var>,
    clip: f64,
}

impl ClippedSgd {
    /// Creates an optimizer over the given variables, clipping gradients to
    /// `[-clip, clip]`.
    pub fn new(vars: Vec<Var>, clip: f64) -> Self {
        Self { vars, clip }
    }

    /// Applies `p <- p - lr * clamp(grad, -clip, clip)` to every variable
    /// that received a gradient.
    pub fn step(&self, grads: &GradStore, lr: f64) -> Result<()> {
        for var in &self.vars {
            if let Some(grad) = grads.get(var) {
                let grad = grad.clamp(-self.clip, self.clip)?;
                let update = (var.as_tensor() - (grad * lr)?)?;
                var.set(&update)?;
            }
        }
        Ok(())
    }
}
