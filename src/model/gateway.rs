use std::future::Future;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::launcher::{ModelLauncher, ProcessHandle};
use super::ports;
use super::protocol::{RemoteAction, RemoteSpace, Request, Response, SETUP_COMPLETE, TO_STRING};
use super::traits::RemoteModel;
use crate::error::{Error, Result};
use crate::translate::decode_remote_list;

/// Port the model listens on when it is started by hand.
pub const DEFAULT_CONTROL_PORT: u16 = 25333;
/// Port the controller listens on for callbacks when the model is started by hand.
pub const DEFAULT_CALLBACK_PORT: u16 = 25334;

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub model_dir: PathBuf,
    pub show_terminal: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GatewayOptions {
    /// Launch the exported model locally; `None` waits for an operator to start it.
    pub launch: Option<LaunchOptions>,
    pub control_port: Option<u16>,
    pub callback_port: Option<u16>,
    /// `None` waits for the model's setup signal forever.
    pub handshake_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    /// Model side: receives control calls.
    pub control: u16,
    /// Controller side: receives the setup signal.
    pub callback: u16,
}

/// Resolves once the model reports that its setup is complete.
#[derive(Debug)]
pub struct ReadySignal {
    receiver: oneshot::Receiver<()>,
}

impl ReadySignal {
    fn new(receiver: oneshot::Receiver<()>) -> Self {
        Self { receiver }
    }
}

impl Future for ReadySignal {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(Error::from))
    }
}

type ReadySender = Arc<Mutex<Option<oneshot::Sender<()>>>>;

async fn serve_callbacks(listener: TcpListener, ready: ReadySender) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "Model opened the callback channel");
                tokio::spawn(handle_callbacks(stream, ready.clone()));
            }
            Err(e) => warn!(error = %e, "Failed to accept a callback connection"),
        }
    }
}

async fn handle_callbacks(stream: TcpStream, ready: ReadySender) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Callback channel failed");
                break;
            }
        };
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed callback");
                continue;
            }
        };
        let response = match request.method.as_str() {
            SETUP_COMPLETE => {
                if let Some(sender) = ready.lock().await.take() {
                    let _ = sender.send(());
                    debug!("Model finished its setup");
                }
                Response::ok(request.id, Value::Bool(true))
            }
            TO_STRING => Response::ok(
                request.id,
                Value::String("simlink controller for an external simulation model".into()),
            ),
            other => Response::err(request.id, format!("unknown callback `{other}`")),
        };
        if write_line(&mut write, &response).await.is_err() {
            break;
        }
    }
}

async fn write_line<T: Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> std::io::Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Outbound control channel. Every call holds the connection for the whole
/// request/response exchange, so calls are strictly ordered.
pub struct GatewayClient {
    connection: Mutex<Option<Connection>>,
    next_id: AtomicU64,
}

impl GatewayClient {
    pub async fn connect(port: u16) -> Result<Self> {
        let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|e| Error::Connection(format!("could not reach the model on port {port}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::Connection(e.to_string()))?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            connection: Mutex::new(Some(Connection {
                reader: BufReader::new(read),
                writer,
            })),
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let result = self.call_raw(method, params).await?;
        serde_json::from_value(result).map_err(|e| {
            Error::Connection(format!("unexpected result from `{method}`: {e}"))
        })
    }

    pub async fn call_raw(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            id,
            method: method.to_string(),
            params,
        };
        let io_error = |e: std::io::Error| Error::Connection(format!("`{method}` failed: {e}"));

        let mut guard = self.connection.lock().await;
        let connection = guard
            .as_mut()
            .ok_or_else(|| Error::Connection("control channel is closed".into()))?;
        write_line(&mut connection.writer, &request)
            .await
            .map_err(io_error)?;
        let mut line = String::new();
        let read = connection
            .reader
            .read_line(&mut line)
            .await
            .map_err(io_error)?;
        if read == 0 {
            *guard = None;
            return Err(Error::Connection(format!(
                "model closed the control channel during `{method}`"
            )));
        }
        drop(guard);

        let response: Response = serde_json::from_str(&line)
            .map_err(|e| Error::Connection(format!("malformed response to `{method}`: {e}")))?;
        if response.id != id {
            return Err(Error::Connection(format!(
                "response id {} does not match request id {id} for `{method}`",
                response.id
            )));
        }
        if let Some(message) = response.error {
            return Err(Error::Connection(format!(
                "model raised an exception in `{method}`: {message}"
            )));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    pub async fn close(&self) {
        if let Some(mut connection) = self.connection.lock().await.take() {
            let _ = connection.writer.shutdown().await;
        }
    }
}

/// Owns everything tied to one model: the control channel, the callback
/// listener and, when launched here, the model process.
pub struct GatewayConnector {
    client: GatewayClient,
    callbacks: JoinHandle<()>,
    process: Option<ProcessHandle>,
    ports: Ports,
    closed: bool,
}

impl GatewayConnector {
    /// Opens the callback listener, launches the model if asked to, waits for
    /// the model's setup signal and then connects the control channel.
    pub async fn connect(options: &GatewayOptions) -> Result<Self> {
        let launcher = options
            .launch
            .as_ref()
            .map(|launch| ModelLauncher::new(&launch.model_dir, launch.show_terminal))
            .transpose()?;
        let launching = launcher.is_some();

        let control = match options.control_port {
            Some(port) => port,
            None if launching => ports::allocate()
                .map_err(|e| Error::Connection(format!("could not allocate a control port: {e}")))?,
            None => DEFAULT_CONTROL_PORT,
        };
        let requested_callback = options
            .callback_port
            .unwrap_or(if launching { 0 } else { DEFAULT_CALLBACK_PORT });
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, requested_callback))
            .await
            .map_err(|e| {
                Error::Connection(format!(
                    "could not listen for callbacks on port {requested_callback}: {e}"
                ))
            })?;
        let callback = listener
            .local_addr()
            .map_err(|e| Error::Connection(e.to_string()))?
            .port();
        let ports = Ports { control, callback };
        debug!(control, callback, "Gateway ports chosen");

        let (sender, receiver) = oneshot::channel();
        let callbacks = tokio::spawn(serve_callbacks(listener, Arc::new(Mutex::new(Some(sender)))));

        let process = match launcher {
            Some(launcher) => {
                match tokio::task::spawn_blocking(move || launcher.launch(control, callback)).await {
                    Ok(Ok(process)) => Some(process),
                    Ok(Err(e)) => {
                        callbacks.abort();
                        return Err(e);
                    }
                    Err(e) => {
                        callbacks.abort();
                        return Err(Error::Launch(format!("launcher task failed: {e}")));
                    }
                }
            }
            None => {
                info!(
                    control,
                    callback, "You can now start the model; the gateway is waiting for it"
                );
                None
            }
        };

        debug!("Waiting for the model to finish its setup");
        match Self::handshake(ReadySignal::new(receiver), control, options.handshake_timeout).await {
            Ok(client) => {
                info!(control, callback, "Connected to the model");
                Ok(Self {
                    client,
                    callbacks,
                    process,
                    ports,
                    closed: false,
                })
            }
            Err(e) => {
                callbacks.abort();
                if let Some(process) = process {
                    terminate(process).await;
                }
                Err(e)
            }
        }
    }

    async fn handshake(
        ready: ReadySignal,
        control: u16,
        timeout: Option<Duration>,
    ) -> Result<GatewayClient> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, ready).await.map_err(|_| {
                Error::Connection(format!("model did not finish its setup within {limit:?}"))
            })??,
            None => ready.await?,
        }
        GatewayClient::connect(control).await
    }

    pub fn ports(&self) -> Ports {
        self.ports
    }

    pub fn process_id(&self) -> Option<u32> {
        self.process.as_ref().map(ProcessHandle::id)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        self.client.call(method, params).await
    }
}

async fn terminate(process: ProcessHandle) {
    match tokio::task::spawn_blocking(move || process.terminate()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Failed to terminate the model"),
        Err(e) => warn!(error = %e, "Model termination task failed"),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Connection(format!("could not encode call: {e}")))
}

#[async_trait]
impl RemoteModel for GatewayConnector {
    async fn reset(&self, params: Option<Map<String, Value>>) -> Result<Vec<f64>> {
        let params = params.map(Value::Object).into_iter().collect();
        self.call("reset", params).await
    }

    async fn step(&self, action: RemoteAction) -> Result<()> {
        self.call("step", vec![encode(&action)?]).await
    }

    async fn get_state(&self) -> Result<Vec<f64>> {
        self.call("getState", vec![]).await
    }

    async fn get_reward(&self) -> Result<f64> {
        self.call("getReward", vec![]).await
    }

    async fn has_finished(&self) -> Result<bool> {
        self.call("hasFinished", vec![]).await
    }

    async fn get_seed(&self) -> Result<i64> {
        self.call("getSeed", vec![]).await
    }

    async fn has_spaces_defined(&self) -> Result<bool> {
        self.call("hasSpacesDefined", vec![]).await
    }

    async fn get_action_space(&self) -> Result<Vec<RemoteSpace>> {
        decode_remote_list(self.client.call_raw("getActionSpace", vec![]).await?)
    }

    async fn get_observation_space(&self) -> Result<Vec<RemoteSpace>> {
        decode_remote_list(self.client.call_raw("getObservationSpace", vec![]).await?)
    }

    async fn define_spaces(
        &self,
        action: Vec<RemoteSpace>,
        observation: Vec<RemoteSpace>,
    ) -> Result<()> {
        self.call("defineSpaces", vec![encode(&action)?, encode(&observation)?])
            .await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.client.close().await;
        self.callbacks.abort();
        if let Some(process) = self.process.take() {
            tokio::task::spawn_blocking(move || process.terminate())
                .await
                .map_err(|e| Error::Launch(format!("model termination task failed: {e}")))??;
        }
        debug!(control = self.ports.control, "Gateway closed");
        Ok(())
    }
}

impl Drop for GatewayConnector {
    fn drop(&mut self) {
        self.callbacks.abort();
        if let Some(process) = self.process.take() {
            if let Err(e) = process.terminate() {
                warn!(error = %e, "Failed to terminate the model on drop");
            }
        }
    }
}
