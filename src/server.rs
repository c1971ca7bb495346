//! Server: accept loop and per-connection dispatch.
//!
//! Every accepted connection gets its own task running a strict
//! request/response cycle:
//!
//! ```text
//! AWAIT_FRAME -> DECODE -> RESOLVE -> INVOKE -> ENCODE -> SEND -> AWAIT_FRAME
//! ```
//!
//! Any failure along the way closes that connection and only that one. The
//! next frame on a connection is not decoded until the previous response has
//! been written.
//!
//! # Example
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use wirepool::Server;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Ping { seq: u32 }
//!
//! #[tokio::main]
//! async fn main() -> wirepool::Result<()> {
//!     let mut server = Server::new();
//!     server.register("ping", |p: Ping| async move { p })?;
//!
//!     let listener = server.listen("127.0.0.1:3000").await?;
//!     server.serve(listener).await
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{watch, Semaphore};

use crate::codec::{Codec, MsgPackCodec};
use crate::config::ServerConfig;
use crate::error::{Result, RpcError};
use crate::handler::HandlerRegistry;
use crate::protocol::{decode_frame, encode_frame, write_frame, Envelope, FrameBuffer};
use crate::transport::Listener;

/// Socket read size for the per-connection loop.
const READ_CHUNK: usize = 8 * 1024;

/// Pause after a failed accept (fd exhaustion and the like).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// RPC server: a handler registry plus connection-handling settings.
pub struct Server<C: Codec = MsgPackCodec> {
    registry: HandlerRegistry<C>,
    config: ServerConfig,
}

impl Server {
    /// Create a server with default settings and the MsgPack codec.
    pub fn new() -> Self {
        Self::with_codec()
    }

    /// Create a server from a loaded config, using the MsgPack codec.
    pub fn from_config(config: ServerConfig) -> Self {
        Self::with_codec().config(config)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> Server<C> {
    /// Create a server with default settings for codec `C`.
    pub fn with_codec() -> Self {
        Self {
            registry: HandlerRegistry::with_codec(),
            config: ServerConfig::default(),
        }
    }

    /// Replace all settings.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Close connections that send nothing for `timeout`.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_read_timeout(timeout);
        self
    }

    /// Cap the number of concurrently served connections.
    ///
    /// When this limit is reached, new connections are closed right after
    /// accept with a warning.
    /// Default: 1024
    pub fn max_connections(mut self, limit: usize) -> Self {
        self.config.max_connections = limit;
        self
    }

    /// Register an operation handler. See [`HandlerRegistry::register`].
    pub fn register<F, Req, Res, Fut>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + DeserializeOwned + Send + 'static,
        Fut: Future<Output = Res> + Send + 'static,
    {
        self.registry.register(name, handler)
    }

    /// Fail unless every operation in `names` has a handler.
    pub fn require(&self, names: &[&str]) -> Result<()> {
        self.registry.ensure_registered(names)
    }

    /// The handler registry.
    pub fn registry(&self) -> &HandlerRegistry<C> {
        &self.registry
    }

    /// Bind a listener on `addr`.
    pub async fn listen(&self, addr: &str) -> Result<Listener> {
        Listener::bind(addr).await
    }

    /// Bind a listener on the configured listen address.
    pub async fn bind(&self) -> Result<Listener> {
        Listener::bind(&self.config.listen_address).await
    }

    /// Accept connections until the listener's [`ShutdownHandle`] fires.
    ///
    /// Connections already being served keep running after this returns.
    ///
    /// [`ShutdownHandle`]: crate::transport::ShutdownHandle
    ///
    /// # Errors
    ///
    /// [`RpcError::Config`] if the settings are out of range.
    pub async fn serve(self, listener: Listener) -> Result<()> {
        self.config.validate()?;
        let registry = Arc::new(self.registry);
        let read_timeout = self.config.read_timeout();
        let limit = Arc::new(Semaphore::new(self.config.max_connections));
        let mut shutdown = listener.shutdown_signal();

        tracing::info!(
            "Serving {} operations on {}",
            registry.len(),
            listener.local_addr()?
        );

        loop {
            let stopping = *shutdown.borrow_and_update();
            if stopping {
                break;
            }

            let accepted = tokio::select! {
                _ = shutdown.changed() => continue,
                accepted = listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Accept failed, retrying in {:?}: {}", ACCEPT_BACKOFF, e);
                    accept_backoff(&mut shutdown, ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let permit = match limit.clone().try_acquire_owned() {
                Ok(p) => p,
                Err(_) => {
                    tracing::warn!("Connection limit reached, closing connection from {}", peer);
                    drop(stream);
                    continue;
                }
            };

            tracing::debug!("Accepted connection from {}", peer);
            let registry = registry.clone();

            tokio::spawn(async move {
                // Permit is held until the connection closes
                let _permit = permit;

                match serve_connection(stream, &registry, read_timeout).await {
                    Ok(()) => tracing::debug!("Connection from {} closed", peer),
                    Err(e) => tracing::warn!("Connection from {} torn down: {}", peer, e),
                }
            });
        }

        tracing::info!("Listener shut down");
        Ok(())
    }
}

/// Wait out `delay` after an accept error, returning early on shutdown.
async fn accept_backoff(shutdown: &mut watch::Receiver<bool>, delay: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = shutdown.changed() => {}
    }
}

/// Run the dispatch loop for one connection until the peer closes it or a
/// step fails.
///
/// Returns `Ok(())` only when the peer closed on a frame boundary.
pub(crate) async fn serve_connection<C, S>(
    mut stream: S,
    registry: &HandlerRegistry<C>,
    read_timeout: Option<Duration>,
) -> Result<()>
where
    C: Codec,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut frames = FrameBuffer::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        while let Some(body) = frames.next_frame()? {
            let request = decode_frame::<C>(&body)?;
            let binding = registry.resolve(&request.name)?;
            let payload = binding.call(&request.payload).await?;

            let response = encode_frame::<C>(&Envelope::new(request.name, payload))?;
            write_frame(&mut stream, &response).await?;
        }

        let n = match read_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.read(&mut buf))
                .await
                .map_err(|_| RpcError::Timeout)??,
            None => stream.read(&mut buf).await?,
        };
        if n == 0 {
            return frames.finish();
        }
        frames.extend(&buf[..n]);
    }
}
