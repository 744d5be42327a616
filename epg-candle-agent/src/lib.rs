#![warn(missing_docs)]
//! Candle networks for evolved policy gradients.
//!
//! One [`EpgModel`] bundles the policy network, the learned memory vector,
//! the context summarizer and the learned loss network, together with the
//! clipped gradient steps of the inner loop and the phi parameter
//! export/import used by the outer loop.
mod batch;
pub use batch::TransitionBatch;

mod config;
pub use config::EpgModelConfig;

mod context;
pub use context::ContextNet;

mod loss;
pub use loss::LossNet;

mod memory;
pub use memory::MemoryNet;

mod model;
pub use model::{Context, EpgModel, PhiParams};

mod opt;
pub use opt::ClippedSgd;

mod policy;
pub use policy::PolicyNet;

pub mod util;
