//! Everything that talks to the external simulation model.

pub mod gateway;
pub mod launcher;
pub mod ports;
pub mod protocol;
mod traits;

pub use gateway::{
    DEFAULT_CALLBACK_PORT, DEFAULT_CONTROL_PORT, GatewayClient, GatewayConnector, GatewayOptions,
    LaunchOptions, Ports,
};
pub use launcher::{ModelLauncher, Platform, ProcessHandle};
pub use protocol::{RemoteAction, RemoteSpace};
pub use traits::RemoteModel;
