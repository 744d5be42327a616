//! This module is used for tests.
use crate::{Env, Step};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration of [`DummyEnv`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DummyEnvConfig {
    /// Observation dimension.
    pub obs_dim: usize,

    /// Action dimension.
    pub act_dim: usize,

    /// Steps until the episode terminates.
    pub episode_len: usize,
}

impl Default for DummyEnvConfig {
    fn default() -> Self {
        Self {
            obs_dim: 3,
            act_dim: 2,
            episode_len: 16,
        }
    }
}

/// A decaying point-mass with a quadratic cost, terminating after a fixed
/// number of steps.
pub struct DummyEnv {
    config: DummyEnvConfig,
    state: Vec<f32>,
    t: usize,
    rng: StdRng,
}

impl Env for DummyEnv {
    type Config = DummyEnvConfig;

    fn build(config: &Self::Config, seed: u64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            state: vec![0.0; config.obs_dim],
            t: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.t = 0;
        for x in self.state.iter_mut() {
            *x = self.rng.gen_range(-0.5..0.5);
        }
        Ok(self.state.clone())
    }

    fn step(&mut self, act: &[f32]) -> Result<Step> {
        for (i, x) in self.state.iter_mut().enumerate() {
            *x = 0.9 * *x + 0.1 * act[i % self.config.act_dim.max(1)];
        }
        let cost: f32 = self.state.iter().map(|x| x * x).sum();
        self.t += 1;
        Ok(Step {
            obs: self.state.clone(),
            reward: -cost / self.config.obs_dim.max(1) as f32,
            is_terminated: self.t >= self.config.episode_len,
        })
    }
}

#[cfg(test)]
mod test {
    use super::{DummyEnv, DummyEnvConfig};
    use crate::Env;

    #[test]
    fn test_episode_terminates() {
        let config = DummyEnvConfig {
            obs_dim: 3,
            act_dim: 2,
            episode_len: 4,
        };
        let mut env = DummyEnv::build(&config, 42).unwrap();
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), 3);
        for i in 0..4 {
            let step = env.step(&[0.1, -0.1]).unwrap();
            assert_eq!(step.obs.len(), 3);
            assert_eq!(step.is_terminated, i == 3);
        }
    }
}
