//! # wirepool
//!
//! Request/response RPC over plain TCP.
//!
//! Every message on a connection is a frame: a 4-byte ASCII decimal length
//! header followed by that many body bytes. The body is an [`Envelope`]
//! naming the operation and carrying the encoded request or response record.
//!
//! ## Architecture
//!
//! - **Server**: a [`HandlerRegistry`](handler::HandlerRegistry) of typed
//!   async handlers, one task per accepted connection, strictly one
//!   request at a time per connection
//! - **Client**: a fixed-size [`ConnectionPool`] handing out one exclusive
//!   connection per in-flight [`Client::call`]
//!
//! Domain failures travel inside response records; [`RpcError`] only
//! reports framing, encoding and I/O problems.
//!
//! ## Example
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use wirepool::{Client, ClientConfig, Server};
//!
//! #[derive(Serialize, Deserialize)]
//! struct ReqEcho { text: String }
//!
//! #[derive(Serialize, Deserialize)]
//! struct ResEcho { text: String }
//!
//! #[tokio::main]
//! async fn main() -> wirepool::Result<()> {
//!     let mut server = Server::new();
//!     server.register("echo", |req: ReqEcho| async move { ResEcho { text: req.text } })?;
//!     let listener = server.listen("127.0.0.1:0").await?;
//!     let addr = listener.local_addr()?.to_string();
//!     tokio::spawn(server.serve(listener));
//!
//!     let client = Client::connect(ClientConfig::new(2, addr)).await?;
//!     let res: ResEcho = client.call("echo", &ReqEcho { text: "hi".into() }).await?;
//!     assert_eq!(res.text, "hi");
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod pool;
pub mod protocol;
pub mod transport;

mod client;
mod server;

pub use client::Client;
pub use config::{ClientConfig, ServerConfig};
pub use error::{Result, RpcError};
pub use pool::{ConnectionPool, PooledConnection};
pub use protocol::Envelope;
pub use server::Server;
pub use transport::{Listener, ShutdownHandle};
