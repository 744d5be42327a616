//! Learned loss network.
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};

/// Emits one learned loss scalar per mini-batch row.
///
/// Together with the context convolutions this network forms "phi", the
/// object of the outer evolutionary optimization; the inner loop only
/// differentiates through it.
pub struct LossNet {
    hidden: Linear,
    out: Linear,
}

impl LossNet {
    /// Builds the network under the given variable builder.
    pub fn build(vb: VarBuilder, in_dim: usize, units: usize) -> Result<Self> {
        let hidden = linear(in_dim, units, vb.pp("h"))?;
        let out = linear(units, 1, vb.pp("out"))?;
        Ok(Self { hidden, out })
    }

    /// Maps `(batch, in_dim)` features to `(batch, 1)` loss values.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(self.out.forward(&self.hidden.forward(xs)?.elu(1.0)?)?)
    }
}
