//! Protocol module - wire format, envelopes and framing.
//!
//! This module implements the wire codec:
//! - 4-byte ASCII decimal length header
//! - [`Envelope`] body carrying the operation name and payload
//! - exact single-frame reads for the client, [`FrameBuffer`] for the server

mod envelope;
mod frame;
mod frame_buffer;
mod wire_format;

pub use envelope::Envelope;
pub use frame::{build_frame, decode_frame, encode_frame, read_frame, write_frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{decode_header, encode_header, HEADER_WIDTH, MAX_BODY_LEN};
