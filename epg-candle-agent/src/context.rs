//! Context summarizer over the trajectory window.
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{conv1d, Conv1d, Conv1dConfig, Module, VarBuilder};

fn conv_out_len(len: usize, kernel: usize, stride: usize, padding: usize) -> usize {
    (len + 2 * padding - kernel) / stride + 1
}

/// 1-D convolution stack pooling a fixed-length feature window into a single
/// context vector.
///
/// Two strided ELU convolutions downsample the window temporally; a final
/// window-wide convolution collapses what is left into one `context_dim`
/// feature vector.
pub struct ContextNet {
    c1: Conv1d,
    c2: Conv1d,
    c3: Conv1d,
}

impl ContextNet {
    /// Builds the stack for windows of `window` rows of `feature_dim`
    /// features.
    pub fn build(
        vb: VarBuilder,
        feature_dim: usize,
        window: usize,
        channels: usize,
        context_dim: usize,
    ) -> Result<Self> {
        let cfg1 = Conv1dConfig {
            padding: 4,
            stride: 7,
            ..Default::default()
        };
        let c1 = conv1d(feature_dim, channels, 8, cfg1, vb.pp("c1"))?;
        let len = conv_out_len(window, 8, 7, 4);

        let cfg2 = Conv1dConfig {
            padding: 2,
            stride: 2,
            ..Default::default()
        };
        let c2 = conv1d(channels, channels, 4, cfg2, vb.pp("c2"))?;
        let len = conv_out_len(len, 4, 2, 2);

        // Kernel spans the remaining length, leaving a single output column.
        let c3 = conv1d(channels, context_dim, len, Conv1dConfig::default(), vb.pp("c3"))?;

        Ok(Self { c1, c2, c3 })
    }

    /// Pools a `(window, feature_dim)` tensor into a `(context_dim,)` vector.
    pub fn forward(&self, features: &Tensor) -> Result<Tensor> {
        let xs = features.t()?.unsqueeze(0)?;
        let xs = self.c1.forward(&xs)?.elu(1.0)?;
        let xs = self.c2.forward(&xs)?.elu(1.0)?;
        let xs = self.c3.forward(&xs)?.elu(1.0)?;
        Ok(xs.flatten_all()?)
    }
}
