//! Handler registry for dispatching requests by operation name.
//!
//! The registry maps operation names to typed handlers. Each handler takes
//! exactly one request record and produces exactly one response record;
//! both shapes are checked when the handler is registered, so a bad
//! registration stops the server before it ever accepts a connection.
//!
//! # Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use wirepool::handler::HandlerRegistry;
//!
//! #[derive(Serialize, Deserialize)]
//! struct ReqLogout { username: String, token: String }
//!
//! #[derive(Serialize, Deserialize)]
//! struct ResLogout { token: String, code: i32 }
//!
//! let mut registry = HandlerRegistry::new();
//! registry
//!     .register("Logout", |req: ReqLogout| async move {
//!         ResLogout { token: req.token, code: 200 }
//!     })
//!     .unwrap();
//!
//! assert!(registry.resolve("Logout").is_ok());
//! assert!(registry.resolve("Login").is_err());
//! ```

use std::any::type_name;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::shape::check_record;
use crate::codec::{Codec, MsgPackCodec};
use crate::error::{Result, RpcError};

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Decode the request payload, run the operation and return the encoded
    /// response payload.
    fn call(&self, payload: &[u8]) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// Wrapper that decodes the payload before calling the handler and encodes
/// its return value afterwards.
pub struct TypedHandler<C, F, Req, Res, Fut>
where
    C: Codec,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
    Fut: Future<Output = Res> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(C, Req) -> Fut>,
}

impl<C, F, Req, Res, Fut> TypedHandler<C, F, Req, Res, Fut>
where
    C: Codec,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
    Fut: Future<Output = Res> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<C, F, Req, Res, Fut> Handler for TypedHandler<C, F, Req, Res, Fut>
where
    C: Codec,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
    Fut: Future<Output = Res> + Send + 'static,
{
    fn call(&self, payload: &[u8]) -> BoxFuture<'static, Result<Vec<u8>>> {
        let request: Req = match C::decode(payload) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        let fut = (self.handler)(request);
        Box::pin(async move {
            let response = fut.await;
            C::encode(&response)
        })
    }
}

/// A registered operation: name, implementation and its request/response shapes.
pub struct HandlerBinding {
    name: String,
    handler: Box<dyn Handler>,
    request_type: &'static str,
    response_type: &'static str,
}

impl HandlerBinding {
    /// Operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type name of the request record.
    pub fn request_type(&self) -> &'static str {
        self.request_type
    }

    /// Rust type name of the response record.
    pub fn response_type(&self) -> &'static str {
        self.response_type
    }

    /// Invoke the bound handler with an encoded request payload.
    pub async fn call(&self, payload: &[u8]) -> Result<Vec<u8>> {
        self.handler.call(payload).await
    }
}

/// Registry mapping operation names to handlers.
///
/// Populated once at startup, then shared read-only (behind an `Arc`) by
/// every connection task.
pub struct HandlerRegistry<C: Codec = MsgPackCodec> {
    bindings: HashMap<String, HandlerBinding>,
    _codec: PhantomData<fn() -> C>,
}

impl HandlerRegistry {
    /// Create a new empty registry using the default MsgPack codec.
    pub fn new() -> Self {
        Self::with_codec()
    }
}

impl<C: Codec> HandlerRegistry<C> {
    /// Create a new empty registry for codec `C`.
    pub fn with_codec() -> Self {
        Self {
            bindings: HashMap::new(),
            _codec: PhantomData,
        }
    }

    /// Register an operation handler.
    ///
    /// # Errors
    ///
    /// [`RpcError::InvalidHandler`] if `name` is empty or already taken, or
    /// if `Req` or `Res` is not a record type.
    pub fn register<F, Req, Res, Fut>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + DeserializeOwned + Send + 'static,
        Fut: Future<Output = Res> + Send + 'static,
    {
        if name.is_empty() {
            return Err(RpcError::InvalidHandler("operation name is empty".to_string()));
        }
        if self.bindings.contains_key(name) {
            return Err(RpcError::InvalidHandler(format!(
                "operation {:?} is already registered",
                name
            )));
        }
        check_record::<Req>()
            .map_err(|why| RpcError::InvalidHandler(format!("{}: request {}", name, why)))?;
        check_record::<Res>()
            .map_err(|why| RpcError::InvalidHandler(format!("{}: response {}", name, why)))?;

        let typed = TypedHandler::<C, _, _, _, _>::new(handler);
        self.bindings.insert(
            name.to_string(),
            HandlerBinding {
                name: name.to_string(),
                handler: Box::new(typed),
                request_type: type_name::<Req>(),
                response_type: type_name::<Res>(),
            },
        );
        tracing::debug!("Registered operation {}", name);
        Ok(())
    }

    /// Look up the binding for an operation.
    pub fn resolve(&self, name: &str) -> Result<&HandlerBinding> {
        self.bindings
            .get(name)
            .ok_or_else(|| RpcError::UnknownOperation(name.to_string()))
    }

    /// Startup check that every operation the process is expected to serve
    /// has a handler.
    ///
    /// # Errors
    ///
    /// [`RpcError::UnknownOperation`] naming the first missing operation.
    pub fn ensure_registered(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|name| !self.bindings.contains_key(**name)) {
            Some(missing) => Err(RpcError::UnknownOperation(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Decode, run and encode one request for operation `name`.
    pub async fn dispatch(&self, name: &str, payload: &[u8]) -> Result<Vec<u8>> {
        self.resolve(name)?.call(payload).await
    }

    /// Names of all registered operations (unordered).
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if no operation is registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
