//! Policy network.
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};

/// Tanh multilayer perceptron mapping states to bounded actions.
///
/// Hidden layers and the action head all pass through tanh, so outputs land
/// in `[-1, 1]` per dimension. The same weights serve single-state inference
/// and batch training; callers only vary the leading batch dimension.
pub struct PolicyNet {
    layers: Vec<Linear>,
}

impl PolicyNet {
    /// Builds the network under the given variable builder.
    pub fn build(vb: VarBuilder, obs_dim: usize, units: &[usize], act_dim: usize) -> Result<Self> {
        let mut layers = Vec::with_capacity(units.len() + 1);
        let mut in_dim = obs_dim;
        for (i, &out_dim) in units.iter().enumerate() {
            layers.push(linear(in_dim, out_dim, vb.pp(format!("h{}", i)))?);
            in_dim = out_dim;
        }
        layers.push(linear(in_dim, act_dim, vb.pp("out"))?);
        Ok(Self { layers })
    }

    /// Maps a `(batch, obs_dim)` tensor to `(batch, act_dim)` actions.
    pub fn forward(&self, states: &Tensor) -> Result<Tensor> {
        let mut xs = states.clone();
        for layer in &self.layers {
            xs = layer.forward(&xs)?.tanh()?;
        }
        Ok(xs)
    }
}
