//! Environment abstraction.
use anyhow::Result;

/// The outcome of one environment step.
#[derive(Clone, Debug)]
pub struct Step {
    /// Observation after the step.
    pub obs: Vec<f32>,

    /// Reward of the step.
    pub reward: f32,

    /// Flag denoting if the episode is terminated.
    pub is_terminated: bool,
}

/// Represents a continuous-control environment, typically an MDP.
///
/// Observations are fixed-length numeric vectors; actions are fixed-length
/// numeric vectors in a bounded range, consistent with a tanh-squashed
/// policy output.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: u64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Performs an environment step.
    fn step(&mut self, act: &[f32]) -> Result<Step>;

    /// Renders the current state, if the environment supports it.
    fn render(&mut self) {}
}
