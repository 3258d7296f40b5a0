use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::{GatewayOptions, LaunchOptions};

/// Per-instance environment settings.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Launch the exported model as a subprocess. When off, the environment
    /// waits for an operator to start the model on the well-known ports.
    pub run_exported_model: bool,
    pub exported_model_loc: PathBuf,
    pub show_terminals: bool,
    /// Serve without a model: observations are sampled and episodes last one step.
    pub server_mode_on: bool,
    pub verbose: bool,
    pub checkpoint_dir: Option<PathBuf>,
    /// Passed to the model's `reset`.
    pub env_params: Map<String, Value>,
    pub control_port: Option<u16>,
    pub callback_port: Option<u16>,
    pub handshake_timeout_secs: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            run_exported_model: true,
            exported_model_loc: PathBuf::from("./exported_model"),
            show_terminals: false,
            server_mode_on: false,
            verbose: false,
            checkpoint_dir: None,
            env_params: Map::new(),
            control_port: None,
            callback_port: None,
            handshake_timeout_secs: None,
        }
    }
}

impl EnvConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid environment config: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("could not read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            launch: self.run_exported_model.then(|| LaunchOptions {
                model_dir: self.exported_model_loc.clone(),
                show_terminal: self.show_terminals,
            }),
            control_port: self.control_port,
            callback_port: self.callback_port,
            handshake_timeout: self.handshake_timeout_secs.map(Duration::from_secs),
        }
    }
}
