#![warn(missing_docs)]
//! Evolution-strategies training of a learned loss function.
//!
//! The outer loop perturbs the loss parameters ("phi"), evaluates every
//! perturbation with a set of inner-loop workers running in parallel
//! threads, and ascends the resulting finite-difference return gradient.
//! Workers communicate results back over channels; a per-epoch barrier
//! synchronizes their training start.
mod config;
mod messages;
mod trainer;
mod util;
mod worker;

pub use config::EsTrainerConfig;
pub use messages::WorkerResult;
pub use trainer::EsTrainer;
pub use util::{es_gradient, perturb};
pub use worker::Worker;
