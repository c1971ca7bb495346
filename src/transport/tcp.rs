//! TCP listener and connector.
//!
//! # Example
//!
//! ```no_run
//! use wirepool::transport::Listener;
//!
//! # async fn run() -> wirepool::Result<()> {
//! let listener = Listener::bind("127.0.0.1:0").await?;
//! let shutdown = listener.shutdown_handle();
//! println!("listening on {}", listener.local_addr()?);
//! shutdown.shutdown();
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::error::{Result, RpcError};

/// Bound TCP listener plus its shutdown signal.
pub struct Listener {
    listener: TcpListener,
    shutdown_tx: watch::Sender<bool>,
}

/// Cloneable handle that tells a serving [`Listener`] to stop accepting.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Listener {
    /// Bind a TCP listener on `addr`.
    ///
    /// # Errors
    ///
    /// [`RpcError::Bind`] if the address is unusable or already taken.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|source| RpcError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            listener,
            shutdown_tx,
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get a handle that can stop this listener from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok((stream, peer))
    }

    /// Subscribe to the shutdown signal.
    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

/// Open a client connection to `addr`.
///
/// # Errors
///
/// [`RpcError::Connect`] if the connection cannot be established.
pub async fn connect(addr: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| RpcError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    stream.set_nodelay(true).map_err(|source| RpcError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_port_zero() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_in_use() {
        let first = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();

        let result = Listener::bind(&addr).await;
        assert!(matches!(result, Err(RpcError::Bind { addr: a, .. }) if a == addr));
    }

    #[tokio::test]
    async fn test_bind_bad_address() {
        assert!(matches!(
            Listener::bind("not an address").await,
            Err(RpcError::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_and_accept() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (client, accepted) = tokio::join!(connect(&addr), listener.accept());
        let client = client.unwrap();
        let (_server_side, peer) = accepted.unwrap();

        assert_eq!(client.local_addr().unwrap(), peer);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(matches!(
            connect(&addr).await,
            Err(RpcError::Connect { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_handle() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let handle = listener.shutdown_handle();
        let mut signal = listener.shutdown_signal();

        assert!(!handle.is_shutdown());
        handle.clone().shutdown();
        assert!(handle.is_shutdown());

        signal.changed().await.unwrap();
        assert!(*signal.borrow());
    }
}
