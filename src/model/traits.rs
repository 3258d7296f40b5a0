use async_trait::async_trait;
use serde_json::{Map, Value};

use super::protocol::{RemoteAction, RemoteSpace};
use crate::error::Result;

/// Calls the environment makes on a running model.
///
/// Implementations must serialize calls: the model is a turn-based partner and
/// at most one call may be in flight at a time.
#[async_trait]
pub trait RemoteModel: Send + Sync {
    /// Restarts the model, optionally with custom parameters, and returns the
    /// flat initial observation.
    async fn reset(&self, params: Option<Map<String, Value>>) -> Result<Vec<f64>>;

    async fn step(&self, action: RemoteAction) -> Result<()>;

    async fn get_state(&self) -> Result<Vec<f64>>;

    async fn get_reward(&self) -> Result<f64>;

    async fn has_finished(&self) -> Result<bool>;

    async fn get_seed(&self) -> Result<i64>;

    async fn has_spaces_defined(&self) -> Result<bool>;

    async fn get_action_space(&self) -> Result<Vec<RemoteSpace>>;

    async fn get_observation_space(&self) -> Result<Vec<RemoteSpace>>;

    /// Mirrors locally defined spaces to the model.
    async fn define_spaces(
        &self,
        action: Vec<RemoteSpace>,
        observation: Vec<RemoteSpace>,
    ) -> Result<()>;

    /// Releases the channel and stops the model if it was launched here.
    /// Calling it again must be a no-op.
    async fn close(&mut self) -> Result<()>;
}
