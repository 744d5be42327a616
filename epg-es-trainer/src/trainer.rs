//! Outer-loop ES coordinator.
use crate::{
    config::EsTrainerConfig,
    messages::WorkerResult,
    util::{es_gradient, perturb},
    worker::Worker,
};
use anyhow::{anyhow, Result};
use candle_core::Device;
use crossbeam_channel::bounded;
use epg_candle_agent::{EpgModel, EpgModelConfig, PhiParams};
use epg_core::Env;
use log::info;
use std::{
    marker::PhantomData,
    sync::{Arc, Barrier},
    thread,
};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Meta-learns the loss parameters ("phi") with evolution strategies.
///
/// Each epoch perturbs phi into `num_perturbations` variants, evaluates each
/// variant with a group of inner-loop workers started from a shared barrier,
/// and ascends the finite-difference gradient of the mean returns:
///
/// ```mermaid
/// graph LR
///     A[phi] -->|perturb| B[workers]
///     B -->|mean returns| C[ES gradient]
///     C -->|ascent| A
/// ```
///
/// The loop runs for a fixed number of epochs; there is no convergence
/// check.
pub struct EsTrainer<E: Env> {
    config: EsTrainerConfig,
    model_config: EpgModelConfig,
    env_config: E::Config,
    phantom: PhantomData<E>,
}

impl<E> EsTrainer<E>
where
    E: Env + 'static,
    E::Config: Send + 'static,
{
    /// Constructs a trainer, validating the configuration.
    pub fn build(
        config: EsTrainerConfig,
        model_config: EpgModelConfig,
        env_config: E::Config,
    ) -> Result<Self> {
        config.validate(&model_config)?;
        Ok(Self {
            config,
            model_config,
            env_config,
            phantom: PhantomData,
        })
    }

    /// Runs the full ES loop and returns the final phi values.
    pub fn train(&mut self) -> Result<PhiParams> {
        let device = Device::Cpu;
        // A throwaway model instance supplies the initial phi values.
        let mut phi = EpgModel::build(&self.model_config, &device)?.phi()?;
        let mut lr = self.config.lr_loss;
        let mut sigma = self.config.sigma;
        let workers_per_set = self.config.num_workers / self.config.num_perturbations;

        for epoch in 0..self.config.num_epochs {
            let mut noises = Vec::with_capacity(self.config.num_perturbations);
            let mut perturbed = Vec::with_capacity(self.config.num_perturbations);
            for _ in 0..self.config.num_perturbations {
                let (noise, params) = perturb(&phi, sigma, &device)?;
                noises.push(noise);
                perturbed.push(params);
            }

            let returns = self.run_workers(epoch, &perturbed)?;

            let group_returns: Vec<f32> = returns
                .chunks_exact(workers_per_set)
                .map(|group| group.iter().sum::<f32>() / workers_per_set as f32)
                .collect();
            let grad = es_gradient(&noises, &group_returns, sigma)?;
            for (name, g) in grad.iter() {
                let value = phi
                    .get_mut(name)
                    .ok_or_else(|| anyhow!("unknown phi parameter: {}", name))?;
                value.scaled_add(lr as f32, g);
            }
            lr *= self.config.lr_decay;
            sigma *= self.config.sigma_decay;

            let mean = returns.iter().sum::<f32>() / returns.len() as f32;
            info!(
                "epoch {}: mean return {:.4}, lr {:.3e}, sigma {:.4}",
                epoch, mean, lr, sigma
            );

            if self.config.demo_after_epoch {
                self.run_demo(&phi)?;
            }
        }
        Ok(phi)
    }

    /// Spawns one thread per worker and collects every worker's mean return,
    /// indexed by worker id.
    ///
    /// Fails fast on the first worker error; remaining threads are
    /// abandoned, since a failed epoch is not recoverable.
    fn run_workers(&self, epoch: usize, perturbed: &[PhiParams]) -> Result<Vec<f32>> {
        let num_workers = self.config.num_workers;
        let num_perturbations = self.config.num_perturbations;
        let barrier = Arc::new(Barrier::new(num_workers));
        let (sender, receiver) = bounded(num_workers);
        let mut handles = Vec::with_capacity(num_workers);

        for id in 0..num_workers {
            let worker = Worker::<E>::build(
                id,
                self.config.clone(),
                self.model_config.clone(),
                self.env_config.clone(),
                perturbed[id * num_perturbations / num_workers].clone(),
                Some(barrier.clone()),
                false,
                (epoch * num_workers + id) as u64,
            );
            let sender = sender.clone();
            handles.push(thread::spawn(move || {
                let ret = worker.run();
                // The receiver only disappears once the epoch is abandoned.
                let _ = sender.send(WorkerResult { id, ret });
            }));
        }
        drop(sender);

        let mut returns: Vec<Option<f32>> = vec![None; num_workers];
        for result in receiver.iter() {
            let id = result.id;
            let ret = result
                .ret
                .map_err(|e| e.context(format!("worker {} failed", id)))?;
            returns[id] = Some(ret);
        }
        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow!("a worker thread panicked"))?;
        }
        returns
            .into_iter()
            .enumerate()
            .map(|(id, ret)| ret.ok_or_else(|| anyhow!("worker {} reported no result", id)))
            .collect()
    }

    /// Runs one unperturbed worker with rendering enabled to show the
    /// current policy quality.
    fn run_demo(&self, phi: &PhiParams) -> Result<()> {
        let worker = Worker::<E>::build(
            0,
            self.config.clone(),
            self.model_config.clone(),
            self.env_config.clone(),
            phi.clone(),
            None,
            true,
            0,
        );
        let ret = worker.run()?;
        info!("demonstration mean return {:.4}", ret);
        Ok(())
    }
}
