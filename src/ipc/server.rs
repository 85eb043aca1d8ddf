//! TCP RPC server — accept loop and per-connection handler.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::ipc::codec::BasicDecoder;
use crate::ipc::frame::{read_frame, write_frame};
use crate::ipc::router::{DispatchResponse, Service, ServiceRegistry};
use crate::types::{Error, IpcConfig, Result};

/// RPC server hosting a set of services.
#[derive(Debug)]
pub struct RpcServer {
    registry: Arc<ServiceRegistry>,
    listen_addr: String,
    cancel: CancellationToken,
    ipc_config: IpcConfig,
}

impl RpcServer {
    pub fn new(listen_addr: impl Into<String>, ipc_config: IpcConfig) -> Self {
        Self {
            registry: Arc::new(ServiceRegistry::new()),
            listen_addr: listen_addr.into(),
            cancel: CancellationToken::new(),
            ipc_config,
        }
    }

    /// Register a service. Must happen before serving starts.
    pub fn add_service(&mut self, service: Arc<dyn Service>) {
        Arc::make_mut(&mut self.registry).add_service(service);
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Bind the configured address and run until cancelled or a fatal error occurs.
    pub async fn serve(&self) -> Result<()> {
        let listener = TcpListener::bind(self.listen_addr.as_str()).await?;
        self.serve_with_listener(listener).await
    }

    /// Run on an already bound listener.
    pub async fn serve_with_listener(&self, listener: TcpListener) -> Result<()> {
        let conn_semaphore = Arc::new(Semaphore::new(self.ipc_config.max_connections));
        tracing::info!(
            addr = %listener.local_addr()?,
            services = self.registry.len(),
            max_connections = self.ipc_config.max_connections,
            "RPC server listening"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("RPC server shutting down");
                    break;
                }
                accept = listener.accept() => {
                    let (stream, peer) = accept?;

                    let permit = match conn_semaphore.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            tracing::warn!(
                                %peer,
                                max_connections = self.ipc_config.max_connections,
                                "Connection rejected: at max_connections"
                            );
                            drop(stream);
                            continue;
                        }
                    };

                    tracing::debug!(
                        %peer,
                        active = self.ipc_config.max_connections - conn_semaphore.available_permits(),
                        "RPC connection accepted"
                    );
                    let registry = self.registry.clone();
                    let cancel = self.cancel.clone();
                    let ipc_config = self.ipc_config.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, registry, cancel, ipc_config, permit).await {
                            tracing::warn!(%peer, code = e.status_code(), error = %e, "Connection closed with error");
                        } else {
                            tracing::debug!(%peer, "Connection closed");
                        }
                    });
                }
            }
        }
        Ok(())
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Handle a single TCP connection: read frames → route → write replies.
async fn handle_connection(
    stream: TcpStream,
    registry: Arc<ServiceRegistry>,
    cancel: CancellationToken,
    ipc_config: IpcConfig,
    _permit: OwnedSemaphorePermit, // held for connection lifetime
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = next_frame(&mut reader, &ipc_config) => frame,
        };

        let payload = match frame {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(Error::Frame(err)) if err.is_recoverable() => {
                tracing::warn!(error = %err, "Discarding corrupted frame");
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Some(reply) = process_message(&registry, payload).await {
            timed_write(&mut writer, &reply, ipc_config.write_timeout).await?;
        }
    }

    Ok(())
}

/// Read the next frame, treating an idle timeout as end of stream.
async fn next_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    ipc_config: &IpcConfig,
) -> Result<Option<Vec<u8>>> {
    let read = read_frame(reader, ipc_config.max_frame_bytes);
    match ipc_config.idle_timeout {
        None => Ok(read.await?),
        Some(idle) => match tokio::time::timeout(idle, read).await {
            Ok(result) => Ok(result?),
            Err(_elapsed) => {
                tracing::debug!(idle_ms = idle.as_millis() as u64, "Idle timeout, dropping connection");
                Ok(None)
            }
        },
    }
}

/// Decode and route one message. Failures are logged and produce no reply,
/// matching eRPC servers which have no error channel on the wire.
async fn process_message(registry: &ServiceRegistry, payload: Vec<u8>) -> Option<Bytes> {
    let mut body = BasicDecoder::new(payload);
    let header = match body.read_header() {
        Ok(header) => header,
        Err(e) => {
            let e = Error::from(e);
            tracing::warn!(code = e.status_code(), error = %e, "Dropping undecodable message");
            return None;
        }
    };

    tracing::debug!(
        service = header.service,
        request = header.request,
        sequence = header.sequence,
        message_type = ?header.message_type,
        "Dispatching request"
    );

    match registry.route_request(&header, &mut body).await {
        Ok(DispatchResponse::Reply(reply)) => Some(reply),
        Ok(DispatchResponse::NoReply) => None,
        Err(e) => {
            tracing::warn!(
                service = header.service,
                request = header.request,
                sequence = header.sequence,
                code = e.status_code(),
                error = %e,
                "Request failed, no reply sent"
            );
            None
        }
    }
}

/// Write a frame with a timeout. Returns an error if the write takes too long
/// (prevents slow consumers from holding connections indefinitely).
async fn timed_write<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    timeout: Duration,
) -> Result<()> {
    tokio::time::timeout(timeout, write_frame(writer, payload))
        .await
        .map_err(|_| {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Write timeout, dropping connection");
            Error::timeout("reply write")
        })??;
    Ok(())
}
