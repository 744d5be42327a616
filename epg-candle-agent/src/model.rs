//! The EPG model: policy, memory, context and learned loss networks.
use crate::{
    batch::TransitionBatch,
    config::EpgModelConfig,
    context::ContextNet,
    loss::LossNet,
    memory::MemoryNet,
    opt::ClippedSgd,
    policy::PolicyNet,
    util::{array_from_tensor, tensor_from_array},
};
use anyhow::{bail, Context as _, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use ndarray::ArrayD;
use std::{collections::HashMap, fs, path::Path};

/// Named phi parameter values: the context and loss-network weights that the
/// outer evolutionary loop optimizes.
///
/// Plain arrays, so values cross thread boundaries without any tensor-engine
/// state attached.
pub type PhiParams = HashMap<String, ArrayD<f32>>;

/// A pooled context vector, detached from the graph that produced it.
///
/// The inner loop treats the context as a constant input when
/// differentiating the learned loss.
pub struct Context(Tensor);

/// One worker's private model instance.
///
/// Holds three independent variable groups: the policy network (reset per
/// worker, trained by the inner loop), the memory vector (also trained by
/// the inner loop), and phi (context + loss networks, overwritten from the
/// outer loop and never updated here). Workers never share a model; only
/// phi values move between threads.
pub struct EpgModel {
    config: EpgModelConfig,
    device: Device,
    policy_vars: VarMap,
    memory_vars: VarMap,
    phi_vars: VarMap,
    policy: PolicyNet,
    memory: MemoryNet,
    context: ContextNet,
    loss: LossNet,
    policy_opt: ClippedSgd,
    memory_opt: ClippedSgd,
}

impl EpgModel {
    /// Builds a model with freshly initialized parameters.
    pub fn build(config: &EpgModelConfig, device: &Device) -> Result<Self> {
        config.validate()?;

        let policy_vars = VarMap::new();
        let policy = {
            let vb = VarBuilder::from_varmap(&policy_vars, DType::F32, device);
            PolicyNet::build(vb, config.obs_dim, &config.policy_units, config.act_dim)?
        };

        let memory_vars = VarMap::new();
        let memory = {
            let vb = VarBuilder::from_varmap(&memory_vars, DType::F32, device);
            MemoryNet::build(vb, config.memory_size, device)?
        };

        let phi_vars = VarMap::new();
        let (context, loss) = {
            let vb = VarBuilder::from_varmap(&phi_vars, DType::F32, device);
            let context = ContextNet::build(
                vb.pp("context"),
                config.feature_dim(),
                config.buffer_size,
                config.context_channels,
                config.context_dim,
            )?;
            let loss = LossNet::build(
                vb.pp("loss"),
                config.feature_dim() + config.context_dim,
                config.loss_units,
            )?;
            (context, loss)
        };

        let policy_opt = ClippedSgd::new(policy_vars.all_vars(), config.grad_clip);
        let memory_opt = ClippedSgd::new(memory_vars.all_vars(), config.grad_clip);

        Ok(Self {
            config: config.clone(),
            device: device.clone(),
            policy_vars,
            memory_vars,
            phi_vars,
            policy,
            memory,
            context,
            loss,
            policy_opt,
            memory_opt,
        })
    }

    /// The model configuration.
    pub fn config(&self) -> &EpgModelConfig {
        &self.config
    }

    /// The device this model lives on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Action for a single state, bounded to `[-1, 1]` per dimension.
    pub fn action(&self, obs: &[f32]) -> Result<Vec<f32>> {
        if obs.len() != self.config.obs_dim {
            bail!(
                "observation must have {} dimensions, got {}",
                self.config.obs_dim,
                obs.len()
            );
        }
        let xs = Tensor::from_slice(obs, (1, self.config.obs_dim), &self.device)?;
        let act = self.policy.forward(&xs)?;
        Ok(act.squeeze(0)?.to_vec1::<f32>()?)
    }

    /// Feature concatenation `[state, terminal, reward, policy, memory,
    /// policy]` over the rows of `batch`.
    fn features(&self, batch: &TransitionBatch) -> Result<Tensor> {
        let pi = self.policy.forward(&batch.states)?;
        let mem = self.memory.rows(batch.len())?;
        Ok(Tensor::cat(
            &[&batch.states, &batch.terminals, &batch.rewards, &pi, &mem, &pi],
            D::Minus1,
        )?)
    }

    /// Pools a full trajectory window into a context vector.
    ///
    /// The window must span exactly `buffer_size` transitions.
    pub fn context(&self, window: &TransitionBatch) -> Result<Context> {
        if window.len() != self.config.buffer_size {
            bail!(
                "context window must have {} rows, got {}",
                self.config.buffer_size,
                window.len()
            );
        }
        let features = self.features(window)?;
        Ok(Context(self.context.forward(&features)?.detach()))
    }

    /// One inner-loop update on a mini-batch: a clipped gradient step of the
    /// mean learned loss for the policy parameters and one for the memory
    /// parameters, each with its own learning rate.
    pub fn update(
        &mut self,
        batch: &TransitionBatch,
        context: &Context,
        lr_policy: f64,
        lr_memory: f64,
    ) -> Result<()> {
        if batch.len() != self.config.batch_size {
            bail!(
                "mini-batch must have {} rows, got {}",
                self.config.batch_size,
                batch.len()
            );
        }
        let features = self.features(batch)?;
        let ctx = context.0.unsqueeze(0)?.repeat((batch.len(), 1))?;
        let input = Tensor::cat(&[&features, &ctx], D::Minus1)?;
        let loss = self.loss.forward(&input)?.mean_all()?;
        let grads = loss.backward()?;
        self.policy_opt.step(&grads, lr_policy)?;
        self.memory_opt.step(&grads, lr_memory)?;
        Ok(())
    }

    /// Copies the current phi values out as plain named arrays.
    pub fn phi(&self) -> Result<PhiParams> {
        let data = self.phi_vars.data().lock().unwrap();
        data.iter()
            .map(|(name, var)| Ok((name.clone(), array_from_tensor(var.as_tensor())?)))
            .collect()
    }

    /// Saves the three variable groups under the given directory.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;
        self.policy_vars.save(path.join("policy.safetensors"))?;
        self.memory_vars.save(path.join("memory.safetensors"))?;
        self.phi_vars.save(path.join("phi.safetensors"))?;
        info!("Save model to {:?}", path);
        Ok(())
    }

    /// Loads the three variable groups from the given directory.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.policy_vars.load(path.join("policy.safetensors"))?;
        self.memory_vars.load(path.join("memory.safetensors"))?;
        self.phi_vars.load(path.join("phi.safetensors"))?;
        info!("Load model from {:?}", path);
        Ok(())
    }

    /// Overwrites phi parameters with externally supplied values.
    pub fn set_phi(&mut self, phi: &PhiParams) -> Result<()> {
        let data = self.phi_vars.data().lock().unwrap();
        for (name, value) in phi.iter() {
            let var = data
                .get(name)
                .with_context(|| format!("unknown phi parameter: {}", name))?;
            var.set(&tensor_from_array(value, &self.device)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{EpgModel, EpgModelConfig};
    use crate::TransitionBatch;
    use candle_core::Device;
    use epg_core::transition;

    fn config() -> EpgModelConfig {
        EpgModelConfig::default()
            .obs_dim(3)
            .act_dim(2)
            .buffer_size(8)
            .memory_size(4)
            .batch_size(2)
    }

    fn batch(n: usize) -> TransitionBatch {
        let schema = transition::schema(3);
        let elements: Vec<_> = (0..n)
            .map(|i| {
                let x = i as f32 * 0.1;
                transition::make(&schema, &[x, -x, 0.5 * x], i % 4 == 3, -x).unwrap()
            })
            .collect();
        TransitionBatch::from_elements(&elements, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_action_shape_and_bounds() {
        let model = EpgModel::build(&config(), &Device::Cpu).unwrap();
        let act = model.action(&[0.1, -0.2, 0.3]).unwrap();
        assert_eq!(act.len(), 2);
        assert!(act.iter().all(|a| (-1.0..=1.0).contains(a)));
    }

    #[test]
    fn test_action_rejects_wrong_obs_dim() {
        let model = EpgModel::build(&config(), &Device::Cpu).unwrap();
        assert!(model.action(&[0.1, -0.2]).is_err());
    }

    #[test]
    fn test_context_shape() {
        let model = EpgModel::build(&config(), &Device::Cpu).unwrap();
        let context = model.context(&batch(8)).unwrap();
        assert_eq!(context.0.dims(), &[config().context_dim]);
    }

    #[test]
    fn test_context_rejects_partial_window() {
        let model = EpgModel::build(&config(), &Device::Cpu).unwrap();
        assert!(model.context(&batch(4)).is_err());
    }

    #[test]
    fn test_update_changes_policy_and_memory_parameters() {
        let mut model = EpgModel::build(&config(), &Device::Cpu).unwrap();
        let flatten = |vars: &candle_nn::VarMap| -> Vec<f32> {
            vars.all_vars()
                .iter()
                .flat_map(|v| {
                    v.flatten_all()
                        .unwrap()
                        .to_vec1::<f32>()
                        .unwrap()
                        .into_iter()
                })
                .collect()
        };
        let policy_before = flatten(&model.policy_vars);
        let memory_before = flatten(&model.memory_vars);
        let context = model.context(&batch(8)).unwrap();
        model.update(&batch(2), &context, 0.1, 0.1).unwrap();
        assert_ne!(flatten(&model.policy_vars), policy_before);
        assert_ne!(flatten(&model.memory_vars), memory_before);
    }

    #[test]
    fn test_phi_round_trip() {
        let model = EpgModel::build(&config(), &Device::Cpu).unwrap();
        let phi = model.phi().unwrap();
        assert!(!phi.is_empty());

        let mut other = EpgModel::build(&config(), &Device::Cpu).unwrap();
        other.set_phi(&phi).unwrap();
        assert_eq!(other.phi().unwrap(), phi);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir::TempDir::new("epg_model").unwrap();
        let model = EpgModel::build(&config(), &Device::Cpu).unwrap();
        model.save(dir.path()).unwrap();

        let mut other = EpgModel::build(&config(), &Device::Cpu).unwrap();
        other.load(dir.path()).unwrap();
        assert_eq!(other.phi().unwrap(), model.phi().unwrap());
    }

    #[test]
    fn test_set_phi_rejects_unknown_name() {
        let mut model = EpgModel::build(&config(), &Device::Cpu).unwrap();
        let mut phi = model.phi().unwrap();
        let value = phi.values().next().unwrap().clone();
        phi.insert("no_such_parameter".to_string(), value);
        assert!(model.set_phi(&phi).is_err());
    }
}
