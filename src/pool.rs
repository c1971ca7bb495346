//! Client connection pool.
//!
//! The pool owns a fixed number of slots. Each slot holds either a live
//! connection or nothing (a vacant slot left behind by a broken
//! connection). Idle slots wait in a queue; a fair semaphore with one permit
//! per idle slot makes [`ConnectionPool::acquire`] wait without spinning and
//! wakes exactly one waiter per release.
//!
//! A checked-out slot is a [`PooledConnection`] guard. Dropping the guard
//! returns the slot, so a slot is released on every exit path of a call.
//! Calling [`PooledConnection::mark_broken`] first discards the connection
//! instead; the vacant slot is reconnected the next time it is acquired,
//! while the other slots keep their connections.
//!
//! # Example
//!
//! ```no_run
//! use wirepool::pool::ConnectionPool;
//!
//! # async fn run() -> wirepool::Result<()> {
//! let pool = ConnectionPool::connect(4, "127.0.0.1:3000").await?;
//! {
//!     let conn = pool.acquire().await?;
//!     // exclusive use of `conn` here
//! } // released
//! pool.close();
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;

use crate::config::ClientConfig;
use crate::error::{Result, RpcError};
use crate::transport;

/// A pool slot: a live connection, or `None` when it must be reopened.
type Slot = Option<TcpStream>;

struct Shared {
    addr: String,
    size: usize,
    /// Idle slots. Only touched under this lock, never across an await.
    idle: Mutex<VecDeque<Slot>>,
    /// One permit per entry in `idle`. Closed when the pool is closed.
    available: Semaphore,
}

impl Shared {
    fn idle_slots(&self) -> MutexGuard<'_, VecDeque<Slot>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return a slot to the idle queue, or drop it if the pool is closed.
    fn release(&self, slot: Slot) {
        {
            let mut idle = self.idle_slots();
            if self.available.is_closed() {
                tracing::debug!("Pool closed, dropping released connection to {}", self.addr);
                return;
            }
            idle.push_back(slot);
        }
        self.available.add_permits(1);
    }
}

/// Fixed-size pool of TCP connections to one server.
pub struct ConnectionPool {
    shared: Arc<Shared>,
}

impl ConnectionPool {
    /// Eagerly open `size` connections to `addr`.
    ///
    /// # Errors
    ///
    /// [`RpcError::PoolInit`] if `size` is zero or any connection attempt
    /// fails. Connections opened before the failure are closed.
    pub async fn connect(size: usize, addr: &str) -> Result<Self> {
        Self::open_with(size, addr, |addr| async move { transport::connect(&addr).await }).await
    }

    /// Build a pool from a client config.
    pub async fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Self::connect(config.pool_size, &config.server_address).await
    }

    /// Open the initial connections with `open`, all or nothing.
    pub(crate) async fn open_with<F, Fut>(size: usize, addr: &str, mut open: F) -> Result<Self>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<TcpStream>>,
    {
        if size == 0 {
            return Err(RpcError::PoolInit("pool size must be at least 1".to_string()));
        }

        let mut idle = VecDeque::with_capacity(size);
        for attempt in 1..=size {
            match open(addr.to_string()).await {
                Ok(stream) => idle.push_back(Some(stream)),
                Err(e) => {
                    // Dropping `idle` closes everything opened so far
                    return Err(RpcError::PoolInit(format!(
                        "connection {} of {} to {}: {}",
                        attempt, size, addr, e
                    )));
                }
            }
        }

        tracing::debug!("Opened pool of {} connections to {}", size, addr);
        Ok(Self {
            shared: Arc::new(Shared {
                addr: addr.to_string(),
                size,
                idle: Mutex::new(idle),
                available: Semaphore::new(size),
            }),
        })
    }

    /// Take exclusive ownership of one connection, waiting until one is idle.
    ///
    /// A vacant slot is reconnected here.
    ///
    /// # Errors
    ///
    /// - [`RpcError::PoolClosed`] once [`close`](Self::close) has been called,
    ///   including for callers already waiting.
    /// - [`RpcError::Connect`] if a vacant slot cannot be reconnected. The
    ///   slot goes back to the pool still vacant.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let permit = self
            .shared
            .available
            .acquire()
            .await
            .map_err(|_| RpcError::PoolClosed)?;
        // The permit now travels with the slot and is restored on release
        permit.forget();

        let slot = self
            .shared
            .idle_slots()
            .pop_front()
            .ok_or(RpcError::PoolClosed)?;

        let mut conn = PooledConnection {
            stream: slot,
            broken: false,
            shared: self.shared.clone(),
        };

        if conn.stream.is_none() {
            tracing::debug!("Reopening vacant slot to {}", self.shared.addr);
            // Slot goes back vacant if the reconnect fails or this future is dropped
            conn.broken = true;
            conn.stream = Some(transport::connect(&self.shared.addr).await?);
            conn.broken = false;
        }

        Ok(conn)
    }

    /// Stop handing out connections and close every idle one.
    ///
    /// Waiting and future [`acquire`](Self::acquire) calls fail with
    /// [`RpcError::PoolClosed`]. Connections still checked out are closed
    /// when they are released. Idempotent.
    pub fn close(&self) {
        self.shared.available.close();
        let dropped = self.shared.idle_slots().drain(..).flatten().count();
        tracing::debug!(
            "Closed pool to {} ({} idle connections dropped)",
            self.shared.addr,
            dropped
        );
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.available.is_closed()
    }

    /// Total number of slots.
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Number of slots not checked out (live or vacant).
    pub fn idle(&self) -> usize {
        self.shared.idle_slots().len()
    }

    /// Server address every slot connects to.
    pub fn addr(&self) -> &str {
        &self.shared.addr
    }
}

/// Exclusive handle on one pooled connection.
///
/// Reads and writes go straight to the underlying socket. The slot returns
/// to the pool when this guard is dropped.
pub struct PooledConnection {
    stream: Option<TcpStream>,
    broken: bool,
    shared: Arc<Shared>,
}

impl PooledConnection {
    /// Discard this connection on release instead of reusing it.
    ///
    /// Use after any error that leaves the stream in an unknown state.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Undo [`mark_broken`](Self::mark_broken) once an exchange completed cleanly.
    pub(crate) fn mark_healthy(&mut self) {
        self.broken = false;
    }

    /// Whether [`mark_broken`](Self::mark_broken) was called.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Local address of the underlying socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream()?.local_addr()?)
    }

    fn stream(&self) -> io::Result<&TcpStream> {
        self.stream.as_ref().ok_or_else(released)
    }
}

fn released() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "pooled connection already released")
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let stream = self.stream.take();
        if self.broken {
            if stream.is_some() {
                tracing::warn!("Discarding broken connection to {}", self.shared.addr);
            }
            drop(stream);
            self.shared.release(None);
        } else {
            self.shared.release(stream);
        }
    }
}

impl AsyncRead for PooledConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_read(cx, buf),
            None => Poll::Ready(Err(released())),
        }
    }
}

impl AsyncWrite for PooledConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_write(cx, buf),
            None => Poll::Ready(Err(released())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_flush(cx),
            None => Poll::Ready(Err(released())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_shutdown(cx),
            None => Poll::Ready(Err(released())),
        }
    }
}
