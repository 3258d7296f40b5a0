//! Reinforcement-learning environments backed by an external, separately
//! running simulation model.
//!
//! The model is launched as a subprocess (or started by hand), signals over a
//! local callback channel once its setup completes, and is then driven through
//! a line-delimited JSON control channel. [`SimEnv`] wraps that exchange in a
//! blocking `reset`/`step`/`close` interface over typed [`Space`]s.

pub mod env;
pub mod error;
pub mod model;
pub mod serve;
pub mod spaces;
pub mod store;
pub mod translate;

#[cfg(feature = "python")]
mod python;

pub use env::{Env, EnvConfig, EnvState, SimEnv, SimEnvBuilder, SpaceSource, Transition, VecEnv};
pub use error::{Error, Result};
pub use serve::{Policy, PolicyServer};
pub use spaces::{Space, SpaceValue};
pub use store::SpacesStore;
