//! Configuration of the EPG model.
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`EpgModel`](crate::EpgModel).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpgModelConfig {
    /// Observation dimension.
    pub obs_dim: usize,

    /// Action dimension.
    pub act_dim: usize,

    /// Capacity of the trajectory window the context is computed over.
    pub buffer_size: usize,

    /// Number of learned memory units.
    pub memory_size: usize,

    /// Rows per mini-batch fed to the learned loss.
    pub batch_size: usize,

    /// Hidden layer widths of the policy network.
    pub policy_units: Vec<usize>,

    /// Hidden layer width of the learned loss network.
    pub loss_units: usize,

    /// Channels of the intermediate context convolutions.
    pub context_channels: usize,

    /// Dimension of the pooled context vector.
    pub context_dim: usize,

    /// Per-element gradient clipping bound of the inner-loop updates.
    pub grad_clip: f64,
}

impl Default for EpgModelConfig {
    fn default() -> Self {
        Self {
            obs_dim: 24,
            act_dim: 4,
            buffer_size: 512,
            memory_size: 32,
            batch_size: 32,
            policy_units: vec![64, 64],
            loss_units: 16,
            context_channels: 10,
            context_dim: 32,
            grad_clip: 50.0,
        }
    }
}

impl EpgModelConfig {
    /// Sets the observation dimension.
    pub fn obs_dim(mut self, v: usize) -> Self {
        self.obs_dim = v;
        self
    }

    /// Sets the action dimension.
    pub fn act_dim(mut self, v: usize) -> Self {
        self.act_dim = v;
        self
    }

    /// Sets the trajectory window capacity.
    pub fn buffer_size(mut self, v: usize) -> Self {
        self.buffer_size = v;
        self
    }

    /// Sets the number of memory units.
    pub fn memory_size(mut self, v: usize) -> Self {
        self.memory_size = v;
        self
    }

    /// Sets the mini-batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Width of the feature concatenation
    /// `[state, terminal, reward, policy, memory, policy]`.
    pub fn feature_dim(&self) -> usize {
        self.obs_dim + 2 + 2 * self.act_dim + self.memory_size
    }

    /// Validates the dimensions.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.obs_dim > 0, "obs_dim must be positive");
        ensure!(self.act_dim > 0, "act_dim must be positive");
        ensure!(self.buffer_size > 0, "buffer_size must be positive");
        ensure!(self.memory_size > 0, "memory_size must be positive");
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(!self.policy_units.is_empty(), "policy_units must not be empty");
        Ok(())
    }

    /// Constructs [`EpgModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`EpgModelConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::EpgModelConfig;
    use tempdir::TempDir;

    #[test]
    fn test_yaml_round_trip() {
        let dir = TempDir::new("epg_model_config").unwrap();
        let path = dir.path().join("model.yaml");
        let config = EpgModelConfig::default().obs_dim(6).act_dim(2);
        config.save(&path).unwrap();
        assert_eq!(EpgModelConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_feature_dim() {
        let config = EpgModelConfig::default();
        assert_eq!(config.feature_dim(), 24 + 2 + 2 * 4 + 32);
    }
}
