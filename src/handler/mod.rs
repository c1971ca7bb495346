//! Handler module - operation registration and dispatch.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps operation names to typed handlers
//! - [`HandlerBinding`] - one registered operation and its record shapes
//!
//! Handlers are plain async functions from one request record to one
//! response record. Domain failures belong in the response record (a status
//! code field, for example), not in an error.
//!
//! # Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use wirepool::handler::HandlerRegistry;
//!
//! #[derive(Serialize, Deserialize)]
//! struct ReqEcho { text: String }
//!
//! #[derive(Serialize, Deserialize)]
//! struct ResEcho { text: String }
//!
//! let mut registry = HandlerRegistry::new();
//! registry
//!     .register("echo", |req: ReqEcho| async move { ResEcho { text: req.text } })
//!     .unwrap();
//! registry.ensure_registered(&["echo"]).unwrap();
//! ```

mod registry;
mod shape;

pub use registry::{BoxFuture, Handler, HandlerBinding, HandlerRegistry, TypedHandler};
