//! Client call façade over the connection pool.
//!
//! [`Client::call`] is one request/response round trip on one exclusively
//! borrowed connection:
//! 1. Acquire a connection from the pool
//! 2. Encode `{name, request}` and write the frame
//! 3. Read exactly one response frame from the same connection
//! 4. Decode the response payload into the caller's type
//! 5. Release the connection (always, via the guard)
//!
//! A transport failure discards only the connection it happened on.
//! [`Client::call_with_retry`] retries such a failure once;
//! [`Client::rebuild`] replaces the whole pool and is meant for when the
//! server is known to have gone away and come back.
//!
//! # Example
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use wirepool::{Client, ClientConfig};
//!
//! #[derive(Serialize)]
//! struct ReqLogin { username: String, password: String }
//!
//! #[derive(Deserialize)]
//! struct ResLogin { code: i32, token: String }
//!
//! #[tokio::main]
//! async fn main() -> wirepool::Result<()> {
//!     let client = Client::connect(ClientConfig::default()).await?;
//!
//!     let res: ResLogin = client
//!         .call("Login", &ReqLogin { username: "alice".into(), password: "pw".into() })
//!         .await?;
//!     if res.code != 200 {
//!         eprintln!("login refused: {}", res.code);
//!     }
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Codec, MsgPackCodec};
use crate::config::ClientConfig;
use crate::error::{Result, RpcError};
use crate::pool::ConnectionPool;
use crate::protocol::{decode_frame, encode_frame, read_frame, write_frame, Envelope, HEADER_WIDTH};

/// Pooled RPC client.
pub struct Client<C: Codec = MsgPackCodec> {
    pool: RwLock<Arc<ConnectionPool>>,
    config: ClientConfig,
    _codec: PhantomData<fn() -> C>,
}

impl Client {
    /// Open a client with the MsgPack codec.
    ///
    /// # Errors
    ///
    /// [`RpcError::PoolInit`] if the config is invalid or any of the initial
    /// connections cannot be opened.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Self::with_codec(config).await
    }

    /// Open `pool_size` connections to `addr` with the MsgPack codec.
    pub async fn new(pool_size: usize, addr: &str) -> Result<Self> {
        Self::connect(ClientConfig::new(pool_size, addr)).await
    }
}

impl<C: Codec> Client<C> {
    /// Open a client using codec `C`.
    pub async fn with_codec(config: ClientConfig) -> Result<Self> {
        let pool = ConnectionPool::from_config(&config).await?;
        Ok(Self {
            pool: RwLock::new(Arc::new(pool)),
            config,
            _codec: PhantomData,
        })
    }

    /// Call operation `name` once.
    ///
    /// Waits for an idle connection if all are in use. On a transport error
    /// the connection is discarded and its slot reopened on next use; the
    /// error is returned without retrying.
    ///
    /// # Errors
    ///
    /// - [`RpcError::PoolClosed`] after [`close`](Self::close).
    /// - [`RpcError::Encode`] / [`RpcError::FrameTooLarge`] if the request
    ///   cannot be framed.
    /// - [`RpcError::Send`], [`RpcError::ShortRead`],
    ///   [`RpcError::MalformedHeader`], [`RpcError::Timeout`] on transport
    ///   failure.
    /// - [`RpcError::Decode`] if the response does not match `Res`.
    pub async fn call<Req, Res>(&self, name: &str, request: &Req) -> Result<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let pool = self.current_pool();
        let mut conn = pool.acquire().await?;

        // Stays set if this future is dropped mid-exchange
        conn.mark_broken();
        let result = exchange::<C, _, _, _>(&mut conn, name, request, self.config.io_timeout()).await;
        match &result {
            Err(e) if e.is_transport() => {}
            _ => conn.mark_healthy(),
        }
        result
    }

    /// Call operation `name`, retrying exactly once after a transport error.
    pub async fn call_with_retry<Req, Res>(&self, name: &str, request: &Req) -> Result<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        match self.call(name, request).await {
            Err(e) if e.is_transport() => {
                tracing::debug!("Retrying {} after transport error: {}", name, e);
                self.call(name, request).await
            }
            other => other,
        }
    }

    /// Call operation `name`; after a transport error, rebuild the whole pool
    /// and call once more.
    pub async fn call_with_rebuild<Req, Res>(&self, name: &str, request: &Req) -> Result<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        match self.call(name, request).await {
            Err(e) if e.is_transport() => {
                tracing::debug!("Rebuilding pool for {} after transport error: {}", name, e);
                self.rebuild().await?;
                self.call(name, request).await
            }
            other => other,
        }
    }

    /// Replace the pool with a freshly opened one of the same size.
    ///
    /// The new pool is opened first; if that fails the current pool is kept
    /// and the error returned. Calls in flight finish on the old pool, whose
    /// connections are closed as they are released.
    ///
    /// # Errors
    ///
    /// [`RpcError::PoolClosed`] once [`close`](Self::close) has been called.
    pub async fn rebuild(&self) -> Result<()> {
        if self.is_closed() {
            return Err(RpcError::PoolClosed);
        }

        let fresh = Arc::new(ConnectionPool::from_config(&self.config).await?);
        let old = {
            let mut current = self.pool.write().unwrap_or_else(PoisonError::into_inner);
            if current.is_closed() {
                // Closed while the new pool was opening
                drop(current);
                fresh.close();
                return Err(RpcError::PoolClosed);
            }
            std::mem::replace(&mut *current, fresh)
        };
        old.close();

        tracing::info!(
            "Rebuilt pool of {} connections to {}",
            self.config.pool_size,
            self.config.server_address
        );
        Ok(())
    }

    /// Close the pool. Later calls fail with [`RpcError::PoolClosed`].
    pub fn close(&self) {
        // Write lock so a concurrent rebuild cannot swap in an open pool
        let current = self.pool.write().unwrap_or_else(PoisonError::into_inner);
        current.close();
    }

    /// Whether the client has been closed.
    pub fn is_closed(&self) -> bool {
        self.current_pool().is_closed()
    }

    /// Number of pooled connections.
    pub fn pool_size(&self) -> usize {
        self.current_pool().size()
    }

    /// Number of connections not currently borrowed by a call.
    pub fn idle(&self) -> usize {
        self.current_pool().idle()
    }

    /// Settings this client was opened with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn current_pool(&self) -> Arc<ConnectionPool> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// One request/response exchange on an exclusively held stream.
async fn exchange<C, S, Req, Res>(
    stream: &mut S,
    name: &str,
    request: &Req,
    io_timeout: Option<Duration>,
) -> Result<Res>
where
    C: Codec,
    S: AsyncRead + AsyncWrite + Unpin,
    Req: Serialize,
    Res: DeserializeOwned,
{
    let frame = encode_frame::<C>(&Envelope::wrap::<C, _>(name, request)?)?;
    with_deadline(io_timeout, write_frame(stream, &frame)).await?;

    let body = with_deadline(io_timeout, read_frame(stream))
        .await?
        .ok_or(RpcError::ShortRead {
            expected: HEADER_WIDTH,
            received: 0,
        })?;

    let response = decode_frame::<C>(&body)?;
    if response.name != name {
        return Err(RpcError::Decode(format!(
            "response names {:?}, expected {:?}",
            response.name, name
        )));
    }
    response.unwrap_payload::<C, Res>()
}

async fn with_deadline<T, F>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RpcError::Timeout)?,
        None => fut.await,
    }
}
