//! Correlated JSON-lines client for the compilation service.
//!
//! Every request carries a fresh `id`. A single reader task owns the inbound
//! half of the connection and routes each response to the oneshot channel
//! registered under that id, so any number of calls may be in flight on one
//! client without results crossing over.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use ferry_core::{
    GeneratedFileEntry, GenerationOptions, IntermediateRepresentation, PackageDefinition,
    ProjectMetadata, SourceFile,
};

use crate::bridge::CompilationBridge;
use crate::endpoint::ServiceEndpoint;
use crate::error::{io_err, BridgeError};
use crate::protocol::{Method, ServiceRequest, ServiceResponse};

type Reply = Result<Value, BridgeError>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Default)]
struct PendingTable {
    closed: bool,
    waiters: HashMap<u64, oneshot::Sender<Reply>>,
}

type Pending = Arc<Mutex<PendingTable>>;

/// Client handle for one service connection.
pub struct ServiceClient {
    next_id: AtomicU64,
    writer: tokio::sync::Mutex<Writer>,
    pending: Pending,
    reader: JoinHandle<()>,
    // Held so the child is killed when the client goes away.
    child: Mutex<Option<Child>>,
}

#[derive(Serialize)]
struct CompileParams<'a> {
    metadata: &'a ProjectMetadata,
    sources: &'a [SourceFile],
}

#[derive(Serialize)]
struct GenerateParams<'a> {
    options: &'a GenerationOptions,
    ir: &'a IntermediateRepresentation,
}

impl ServiceClient {
    /// Wrap an already-established byte stream.
    ///
    /// Must be called from within a tokio runtime: the response reader is
    /// spawned immediately.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: Pending = Arc::default();
        let reader = tokio::spawn(read_responses(reader, pending.clone()));
        Self {
            next_id: AtomicU64::new(1),
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending,
            reader,
            child: Mutex::new(None),
        }
    }

    /// Connect to a service listening on a Unix socket.
    #[cfg(unix)]
    pub async fn connect(socket: &Path) -> Result<Self, BridgeError> {
        let stream = tokio::net::UnixStream::connect(socket)
            .await
            .map_err(|err| {
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::NotFound
                        | std::io::ErrorKind::ConnectionRefused
                        | std::io::ErrorKind::ConnectionReset
                ) {
                    BridgeError::ServiceUnavailable {
                        endpoint: socket.display().to_string(),
                    }
                } else {
                    io_err(socket.display().to_string(), err)
                }
            })?;
        let (reader, writer) = stream.into_split();
        tracing::debug!(socket = %socket.display(), "connected to compilation service");
        Ok(Self::from_io(reader, writer))
    }

    #[cfg(not(unix))]
    pub async fn connect(socket: &Path) -> Result<Self, BridgeError> {
        Err(BridgeError::Protocol(format!(
            "unix socket endpoints are not supported on this platform: {}",
            socket.display()
        )))
    }

    /// Start the service as a child process speaking on stdin/stdout.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, BridgeError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    BridgeError::ServiceUnavailable {
                        endpoint: program.to_string(),
                    }
                } else {
                    io_err(format!("spawn {program}"), err)
                }
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Protocol("service stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Protocol("service stdout was not captured".to_string()))?;

        tracing::debug!(program, ?args, pid = ?child.id(), "spawned compilation service");
        let client = Self::from_io(stdout, stdin);
        if let Ok(mut slot) = client.child.lock() {
            *slot = Some(child);
        }
        Ok(client)
    }

    /// Open whichever endpoint is configured.
    pub async fn open(endpoint: &ServiceEndpoint) -> Result<Self, BridgeError> {
        match endpoint {
            ServiceEndpoint::Socket(path) => Self::connect(path).await,
            ServiceEndpoint::Command { program, args } => Self::spawn(program, args),
        }
    }

    /// Send one request and wait for the response carrying the same id.
    pub async fn call(&self, method: Method, params: Value) -> Result<Value, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = self.register(id)?;

        let payload = serde_json::to_string(&ServiceRequest { id, method, params })?;
        let sent = {
            let mut writer = self.writer.lock().await;
            write_line(&mut *writer, &payload).await
        };
        if let Err(err) = sent {
            self.forget(id);
            return Err(err);
        }
        tracing::debug!(id, ?method, "service request sent");

        rx.await
            .map_err(|_| BridgeError::ChannelClosed("service response"))?
    }

    fn register(&self, id: u64) -> Result<oneshot::Receiver<Reply>, BridgeError> {
        let (tx, rx) = oneshot::channel();
        let mut table = lock(&self.pending)?;
        if table.closed {
            return Err(BridgeError::ChannelClosed("service connection"));
        }
        table.waiters.insert(id, tx);
        Ok(rx)
    }

    fn forget(&self, id: u64) {
        if let Ok(mut table) = self.pending.lock() {
            table.waiters.remove(&id);
        }
    }
}

impl Drop for ServiceClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl CompilationBridge for ServiceClient {
    async fn compile_sources(
        &self,
        metadata: &ProjectMetadata,
        sources: &[SourceFile],
    ) -> Result<PackageDefinition, BridgeError> {
        let params = serde_json::to_value(CompileParams { metadata, sources })?;
        let data = self.call(Method::Compile, params).await?;
        decode(data)
    }

    async fn generate_artifacts(
        &self,
        options: &GenerationOptions,
        ir: &IntermediateRepresentation,
    ) -> Result<Vec<GeneratedFileEntry>, BridgeError> {
        let params = serde_json::to_value(GenerateParams { options, ir })?;
        let data = self.call(Method::Generate, params).await?;
        decode(data)
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, BridgeError> {
    T::deserialize(&data).map_err(|err| {
        tracing::warn!(error = %err, "service response does not match the expected shape");
        BridgeError::Decode { payload: data }
    })
}

fn lock(pending: &Pending) -> Result<std::sync::MutexGuard<'_, PendingTable>, BridgeError> {
    pending
        .lock()
        .map_err(|_| BridgeError::Protocol("pending request table poisoned".to_string()))
}

async fn write_line(writer: &mut Writer, payload: &str) -> Result<(), BridgeError> {
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("service write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("service write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("service flush", e))
}

/// Route every inbound line to the waiter registered under its `id`.
///
/// A line that is not a valid response fails only the request it names; when
/// no `id` can be read from it, every pending request fails. End of stream
/// fails everything still pending and refuses later calls.
async fn read_responses<R>(reader: R, pending: Pending)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "service read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ServiceResponse>(&line) {
            Ok(response) => dispatch(&pending, response),
            Err(err) => match salvage_id(&line) {
                Some((id, payload)) => {
                    tracing::warn!(id, error = %err, "malformed service response");
                    fail_one(&pending, id, BridgeError::Decode { payload });
                }
                None => {
                    tracing::warn!(error = %err, "undecodable service response");
                    fail_all(&pending, false, || BridgeError::Decode {
                        payload: Value::String(line.clone()),
                    });
                }
            },
        }
    }

    fail_all(&pending, true, || {
        BridgeError::ChannelClosed("service connection")
    });
}

fn dispatch(pending: &Pending, response: ServiceResponse) {
    let waiter = match pending.lock() {
        Ok(mut table) => table.waiters.remove(&response.id),
        Err(_) => None,
    };
    let Some(waiter) = waiter else {
        tracing::warn!(id = response.id, "response for unknown request id");
        return;
    };

    let reply = if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(BridgeError::Decode {
            payload: response.error.unwrap_or(Value::Null),
        })
    };
    let _ = waiter.send(reply);
}

/// The `id` of a JSON object that is not a well-formed response.
fn salvage_id(line: &str) -> Option<(u64, Value)> {
    let value: Value = serde_json::from_str(line).ok()?;
    let id = value.get("id")?.as_u64()?;
    Some((id, value))
}

fn fail_one(pending: &Pending, id: u64, err: BridgeError) {
    let waiter = match pending.lock() {
        Ok(mut table) => table.waiters.remove(&id),
        Err(_) => None,
    };
    match waiter {
        Some(waiter) => {
            let _ = waiter.send(Err(err));
        }
        None => tracing::warn!(id, "malformed response for unknown request id"),
    }
}

fn fail_all(pending: &Pending, close: bool, make_err: impl Fn() -> BridgeError) {
    let waiters: Vec<_> = match pending.lock() {
        Ok(mut table) => {
            table.closed |= close;
            table.waiters.drain().map(|(_, tx)| tx).collect()
        }
        Err(_) => return,
    };
    for waiter in waiters {
        let _ = waiter.send(Err(make_err()));
    }
}
