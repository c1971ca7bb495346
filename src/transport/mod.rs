//! Transport module - TCP listen and connect.
//!
//! The wire protocol is byte-oriented; everything here deals only with
//! opening and accepting sockets. Framing lives in [`crate::protocol`].

mod tcp;

pub use tcp::{connect, Listener, ShutdownHandle};
