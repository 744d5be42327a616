//! Transition windows and mini-batches as tensors.
use crate::util::tensor_from_array;
use anyhow::{bail, Context as _, Result};
use candle_core::{Device, Tensor};
use epg_core::{transition, Element, Value};

/// A stack of transitions as `(n, ·)` tensors, ready for the networks.
pub struct TransitionBatch {
    /// States, `(n, obs_dim)`.
    pub states: Tensor,

    /// Termination flags, `(n, 1)`.
    pub terminals: Tensor,

    /// Rewards, `(n, 1)`.
    pub rewards: Tensor,
}

impl TransitionBatch {
    /// Stacks transition elements into tensors on the given device.
    pub fn from_elements(elements: &[Element], device: &Device) -> Result<Self> {
        let stacked = Element::stack(elements, &[])?;
        Ok(Self {
            states: field_tensor(&stacked, transition::STATE, device)?,
            terminals: field_tensor(&stacked, transition::TERMINAL, device)?,
            rewards: field_tensor(&stacked, transition::REWARD, device)?,
        })
    }

    /// Number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.states.dims()[0]
    }

    /// Whether the batch holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn field_tensor(stacked: &Element, name: &str, device: &Device) -> Result<Tensor> {
    let value = stacked
        .get(name)
        .with_context(|| format!("stacked element has no {} field", name))?;
    match value {
        Value::F32(a) => tensor_from_array(a, device),
        _ => bail!("{} must be an f32 field", name),
    }
}

#[cfg(test)]
mod test {
    use super::TransitionBatch;
    use candle_core::Device;
    use epg_core::transition;

    #[test]
    fn test_from_elements() {
        let schema = transition::schema(3);
        let elements = vec![
            transition::make(&schema, &[0.0, 0.1, 0.2], false, 1.0).unwrap(),
            transition::make(&schema, &[0.3, 0.4, 0.5], true, -1.0).unwrap(),
        ];
        let batch = TransitionBatch::from_elements(&elements, &Device::Cpu).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.states.dims(), &[2, 3]);
        assert_eq!(batch.terminals.dims(), &[2, 1]);
        assert_eq!(batch.rewards.dims(), &[2, 1]);
    }
}
