use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extra per-call information. Always empty for simulation-backed environments.
pub type Info = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvState {
    Uninitialized,
    Connected,
    /// Spaces are negotiated; a reset is required before stepping.
    Ready,
    Stepping,
    Closed,
    ServingOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition<O> {
    pub obs: O,
    pub reward: f64,
    pub done: bool,
    pub truncated: bool,
    pub info: Info,
}
