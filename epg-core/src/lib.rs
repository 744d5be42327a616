#![warn(missing_docs)]
//! Core abstractions for evolved policy gradients.
pub mod dummy;
pub mod error;
pub mod transition;
pub mod util;

mod base;
pub use base::{Env, Step};

mod element;
pub use element::{Dtype, Element, FieldSpec, RunningStats, Schema, Value, DEFAULT_EPS};

mod buffer;
pub use buffer::{Buffer, ReplayBuffer};
