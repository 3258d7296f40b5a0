mod config;
mod sim_env;
mod traits;
mod types;
mod vec_env;

pub use config::EnvConfig;
pub use sim_env::{SimEnv, SimEnvBuilder, SpaceSource};
pub use traits::Env;
pub use types::{EnvState, Info, Transition};
pub use vec_env::VecEnv;
