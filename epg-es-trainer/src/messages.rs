//! Messages between workers and the trainer.
use anyhow::Result;

/// Terminal report of one inner-loop worker.
///
/// Workers send exactly one of these over their channel, whether the run
/// completed or aborted; the trainer fails the epoch on any error.
pub struct WorkerResult {
    /// Worker id within the epoch.
    pub id: usize,

    /// Mean discounted evaluation return, or the error that aborted the run.
    pub ret: Result<f32>,
}
