//! Configuration of [`EsTrainer`](crate::EsTrainer).
use anyhow::{ensure, Result};
use epg_candle_agent::EpgModelConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`EsTrainer`](crate::EsTrainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EsTrainerConfig {
    /// Number of outer-loop epochs.
    pub num_epochs: usize,

    /// Inner-loop workers per epoch; must be a multiple of
    /// `num_perturbations`.
    pub num_workers: usize,

    /// Number of phi perturbations evaluated per epoch.
    pub num_perturbations: usize,

    /// Initial scale of the parameter noise.
    pub sigma: f64,

    /// Geometric decay of the noise scale per epoch.
    pub sigma_decay: f64,

    /// Initial outer-loop learning rate for phi.
    pub lr_loss: f64,

    /// Geometric decay of the outer learning rate per epoch.
    pub lr_decay: f64,

    /// Environment-step budget of each worker's training phase.
    pub num_steps: usize,

    /// Most recent transitions drawn per update cycle.
    pub sample_size: usize,

    /// Episodes rolled out per worker for evaluation.
    pub traj_samples: usize,

    /// Discount factor of the evaluation return.
    pub gamma: f32,

    /// Initial inner-loop policy learning rate.
    pub lr_policy: f64,

    /// Initial inner-loop memory learning rate.
    pub lr_memory: f64,

    /// Multiplicative decay applied to both inner rates after each
    /// mini-batch.
    pub lr_inner_decay: f64,

    /// Runs an unperturbed, rendering demonstration worker after each epoch.
    pub demo_after_epoch: bool,
}

impl Default for EsTrainerConfig {
    fn default() -> Self {
        Self {
            num_epochs: 5,
            num_workers: 64,
            num_perturbations: 16,
            sigma: 2.0,
            sigma_decay: 0.85,
            lr_loss: 2e-3,
            lr_decay: 0.99,
            num_steps: 4096,
            sample_size: 64,
            traj_samples: 256,
            gamma: 0.95,
            lr_policy: 7e-4,
            lr_memory: 7e-4,
            lr_inner_decay: 0.99,
            demo_after_epoch: true,
        }
    }
}

impl EsTrainerConfig {
    /// Sets the number of epochs.
    pub fn num_epochs(mut self, v: usize) -> Self {
        self.num_epochs = v;
        self
    }

    /// Sets the number of workers per epoch.
    pub fn num_workers(mut self, v: usize) -> Self {
        self.num_workers = v;
        self
    }

    /// Sets the number of perturbations per epoch.
    pub fn num_perturbations(mut self, v: usize) -> Self {
        self.num_perturbations = v;
        self
    }

    /// Sets the initial noise scale.
    pub fn sigma(mut self, v: f64) -> Self {
        self.sigma = v;
        self
    }

    /// Sets each worker's environment-step budget.
    pub fn num_steps(mut self, v: usize) -> Self {
        self.num_steps = v;
        self
    }

    /// Sets the number of transitions drawn per update cycle.
    pub fn sample_size(mut self, v: usize) -> Self {
        self.sample_size = v;
        self
    }

    /// Sets the number of evaluation episodes per worker.
    pub fn traj_samples(mut self, v: usize) -> Self {
        self.traj_samples = v;
        self
    }

    /// Sets the discount factor of the evaluation return.
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// Enables or disables the per-epoch demonstration run.
    pub fn demo_after_epoch(mut self, v: bool) -> Self {
        self.demo_after_epoch = v;
        self
    }

    /// Validates the schedule against the model dimensions.
    pub fn validate(&self, model_config: &EpgModelConfig) -> Result<()> {
        ensure!(self.num_workers > 0, "num_workers must be positive");
        ensure!(self.num_perturbations > 0, "num_perturbations must be positive");
        ensure!(
            self.num_workers % self.num_perturbations == 0,
            "num_workers ({}) must be a multiple of num_perturbations ({})",
            self.num_workers,
            self.num_perturbations
        );
        ensure!(self.traj_samples > 0, "traj_samples must be positive");
        ensure!(
            self.sample_size > 0 && self.sample_size % model_config.batch_size == 0,
            "sample_size ({}) must be a positive multiple of batch_size ({})",
            self.sample_size,
            model_config.batch_size
        );
        ensure!(
            self.sample_size <= model_config.buffer_size,
            "sample_size ({}) must not exceed buffer_size ({})",
            self.sample_size,
            model_config.buffer_size
        );
        Ok(())
    }

    /// Constructs [`EsTrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`EsTrainerConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::EsTrainerConfig;
    use epg_candle_agent::EpgModelConfig;
    use tempdir::TempDir;

    #[test]
    fn test_yaml_round_trip() {
        let dir = TempDir::new("es_trainer_config").unwrap();
        let path = dir.path().join("trainer.yaml");
        let config = EsTrainerConfig::default().num_epochs(2).num_workers(8);
        config.save(&path).unwrap();
        assert_eq!(EsTrainerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_uneven_worker_split() {
        let config = EsTrainerConfig::default()
            .num_workers(10)
            .num_perturbations(4);
        assert!(config.validate(&EpgModelConfig::default()).is_err());
    }

    #[test]
    fn test_validate_rejects_partial_mini_batches() {
        let config = EsTrainerConfig::default().sample_size(48);
        assert!(config.validate(&EpgModelConfig::default()).is_err());
    }
}
