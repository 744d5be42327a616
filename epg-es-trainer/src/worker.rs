//! Inner-loop worker.
use crate::config::EsTrainerConfig;
use anyhow::Result;
use candle_core::Device;
use epg_candle_agent::{EpgModel, EpgModelConfig, PhiParams, TransitionBatch};
use epg_core::{transition, util::discounted_return, Buffer, Element, Env, ReplayBuffer};
use log::debug;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::sync::{Arc, Barrier};

/// Runs one episodic training-and-evaluation pass against a single set of
/// (possibly perturbed) loss parameters.
///
/// Each worker owns a private model and environment; co-workers of an epoch
/// only share the start barrier. After loading phi and passing the barrier,
/// the worker rolls out episodes until its step budget is exhausted,
/// periodically updating the policy and memory parameters with the learned
/// loss, then evaluates the frozen policy over fresh episodes.
pub struct Worker<E: Env> {
    id: usize,
    config: EsTrainerConfig,
    model_config: EpgModelConfig,
    env_config: E::Config,
    phi: PhiParams,
    barrier: Option<Arc<Barrier>>,
    render: bool,
    seed: u64,
}

impl<E: Env> Worker<E> {
    /// Constructs a worker bound to one phi parameter set.
    pub fn build(
        id: usize,
        config: EsTrainerConfig,
        model_config: EpgModelConfig,
        env_config: E::Config,
        phi: PhiParams,
        barrier: Option<Arc<Barrier>>,
        render: bool,
        seed: u64,
    ) -> Self {
        Self {
            id,
            config,
            model_config,
            env_config,
            phi,
            barrier,
            render,
            seed,
        }
    }

    /// Runs the worker to completion and returns the mean discounted
    /// evaluation return.
    pub fn run(self) -> Result<f32> {
        let mut env = E::build(&self.env_config, self.seed)?;
        let mut model = EpgModel::build(&self.model_config, &Device::Cpu)?;
        model.set_phi(&self.phi)?;

        // All co-workers finish loading before any of them starts stepping,
        // so perturbations are compared from a synchronized start.
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }

        self.train(&mut env, &mut model)?;
        self.evaluate(&mut env, &model)
    }

    fn train(&self, env: &mut E, model: &mut EpgModel) -> Result<()> {
        let schema = transition::schema(self.model_config.obs_dim);
        let mut buffer = ReplayBuffer::new(self.model_config.buffer_size);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut lr_policy = self.config.lr_policy;
        let mut lr_memory = self.config.lr_memory;
        let n = self.model_config.buffer_size;
        let m = self.config.sample_size;
        let mut t = 0;

        'training: while t < self.config.num_steps {
            let mut obs = env.reset()?;
            let mut episode_steps = 0;
            loop {
                let act = model.action(&obs)?;
                let step = env.step(&act)?;
                buffer.push(transition::make(&schema, &obs, step.is_terminated, step.reward)?);
                obs = step.obs;
                t += 1;
                episode_steps += 1;
                if t >= self.config.num_steps {
                    break 'training;
                }
                if t == n || (t > n && t % m == 0) {
                    self.opt_cycle(model, &buffer, &mut lr_policy, &mut lr_memory, &mut rng)?;
                }
                if step.is_terminated {
                    debug!("worker {}: episode ended after {} steps", self.id, episode_steps);
                    break;
                }
            }
        }
        Ok(())
    }

    /// One update cycle: context over the full window, then clipped gradient
    /// steps on shuffled mini-batches of the most recent transitions.
    fn opt_cycle(
        &self,
        model: &mut EpgModel,
        buffer: &ReplayBuffer<Element>,
        lr_policy: &mut f64,
        lr_memory: &mut f64,
        rng: &mut StdRng,
    ) -> Result<()> {
        let window = buffer.sample(self.model_config.buffer_size, false)?;
        let full = TransitionBatch::from_elements(&window, model.device())?;
        let context = model.context(&full)?;

        let mut recent = window[window.len() - self.config.sample_size..].to_vec();
        recent.shuffle(rng);
        for chunk in recent.chunks_exact(self.model_config.batch_size) {
            let batch = TransitionBatch::from_elements(chunk, model.device())?;
            model.update(&batch, &context, *lr_policy, *lr_memory)?;
            *lr_policy *= self.config.lr_inner_decay;
            *lr_memory *= self.config.lr_inner_decay;
        }
        Ok(())
    }

    fn evaluate(&self, env: &mut E, model: &EpgModel) -> Result<f32> {
        let mut returns = Vec::with_capacity(self.config.traj_samples);
        for _ in 0..self.config.traj_samples {
            let mut obs = env.reset()?;
            let mut rewards = Vec::new();
            loop {
                let act = model.action(&obs)?;
                let step = env.step(&act)?;
                if self.render {
                    env.render();
                }
                rewards.push(step.reward);
                obs = step.obs;
                if step.is_terminated {
                    break;
                }
            }
            debug!("worker {}: evaluation episode of {} steps", self.id, rewards.len());
            returns.push(discounted_return(&rewards, self.config.gamma));
        }
        Ok(returns.iter().sum::<f32>() / self.config.traj_samples as f32)
    }
}

#[cfg(test)]
mod test {
    use super::Worker;
    use crate::config::EsTrainerConfig;
    use candle_core::Device;
    use epg_candle_agent::{EpgModel, EpgModelConfig};
    use epg_core::dummy::{DummyEnv, DummyEnvConfig};

    #[test]
    fn test_worker_returns_finite_mean_return() {
        let model_config = EpgModelConfig::default()
            .obs_dim(3)
            .act_dim(2)
            .buffer_size(8)
            .memory_size(4)
            .batch_size(2);
        let config = EsTrainerConfig::default()
            .num_steps(12)
            .sample_size(4)
            .traj_samples(2);
        let env_config = DummyEnvConfig {
            obs_dim: 3,
            act_dim: 2,
            episode_len: 6,
        };
        let phi = EpgModel::build(&model_config, &Device::Cpu)
            .unwrap()
            .phi()
            .unwrap();
        let worker =
            Worker::<DummyEnv>::build(0, config, model_config, env_config, phi, None, false, 7);
        let ret = worker.run().unwrap();
        assert!(ret.is_finite());
    }
}
