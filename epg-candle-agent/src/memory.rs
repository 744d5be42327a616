//! Learned memory vector.
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{linear_no_bias, Linear, Module, VarBuilder};

/// A small set of bias-like learned parameters.
///
/// A fixed all-ones input through one dense layer with tanh; the resulting
/// `(1, size)` vector is tiled to whatever row count a concatenation needs.
pub struct MemoryNet {
    layer: Linear,
    ones: Tensor,
}

impl MemoryNet {
    /// Builds the memory layer under the given variable builder.
    pub fn build(vb: VarBuilder, size: usize, device: &Device) -> Result<Self> {
        let layer = linear_no_bias(size, size, vb.pp("m"))?;
        let ones = Tensor::ones((1, size), DType::F32, device)?;
        Ok(Self { layer, ones })
    }

    /// The `(1, size)` memory vector.
    pub fn forward(&self) -> Result<Tensor> {
        Ok(self.layer.forward(&self.ones)?.tanh()?)
    }

    /// The memory vector tiled to `(n, size)`.
    pub fn rows(&self, n: usize) -> Result<Tensor> {
        Ok(self.forward()?.repeat((n, 1))?)
    }
}
