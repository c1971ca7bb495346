//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 4 header bytes
//! - `WaitingForBody`: Header parsed, need N more body bytes
//!
//! # Example
//!
//! ```
//! use wirepool::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//! buffer.extend(b"0003ab");
//! assert!(buffer.next_frame().unwrap().is_none());
//!
//! buffer.extend(b"c");
//! assert_eq!(&buffer.next_frame().unwrap().unwrap()[..], b"abc");
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{decode_header, HEADER_WIDTH, MAX_BODY_LEN};
use crate::error::{Result, RpcError};

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for a complete header.
    WaitingForHeader,
    /// Header parsed, waiting for `len` body bytes.
    WaitingForBody { len: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frame bodies.
///
/// Frames are extracted one at a time with [`next_frame`](Self::next_frame),
/// so a caller can fully handle frame N before frame N+1 is even parsed.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
}

impl FrameBuffer {
    /// Create a new frame buffer sized for one maximum frame.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(HEADER_WIDTH + MAX_BODY_LEN),
            state: State::WaitingForHeader,
        }
    }

    /// Append data read from the socket.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract a single frame body from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(body))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(MalformedHeader)` if the next header is not decimal
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if let State::WaitingForHeader = self.state {
            if self.buffer.len() < HEADER_WIDTH {
                return Ok(None);
            }

            let len = decode_header(&self.buffer[..HEADER_WIDTH])?;
            let _ = self.buffer.split_to(HEADER_WIDTH);
            self.state = State::WaitingForBody { len };
        }

        let State::WaitingForBody { len } = self.state else {
            return Ok(None);
        };

        if self.buffer.len() < len {
            return Ok(None);
        }

        let body = self.buffer.split_to(len).freeze();
        self.state = State::WaitingForHeader;
        Ok(Some(body))
    }

    /// Check that the stream ended on a frame boundary.
    ///
    /// Call this once the peer has closed the stream.
    ///
    /// # Errors
    ///
    /// [`RpcError::ShortRead`] if a header or body was cut off.
    pub fn finish(&self) -> Result<()> {
        match self.state {
            State::WaitingForHeader if self.buffer.is_empty() => Ok(()),
            State::WaitingForHeader => Err(RpcError::ShortRead {
                expected: HEADER_WIDTH,
                received: self.buffer.len(),
            }),
            State::WaitingForBody { len } => Err(RpcError::ShortRead {
                expected: len,
                received: self.buffer.len(),
            }),
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame;

    fn make_frame_bytes(body: &[u8]) -> Vec<u8> {
        build_frame(body).unwrap().to_vec()
    }

    fn drain(buffer: &mut FrameBuffer) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Some(frame) = buffer.next_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(&make_frame_bytes(b"hello"));

        let frames = drain(&mut buffer);

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"hello");
        assert!(buffer.is_empty());
        assert!(buffer.finish().is_ok());
    }

    #[test]
    fn test_multiple_frames_in_one_read() {
        let mut buffer = FrameBuffer::new();

        let mut combined = Vec::new();
        combined.extend_from_slice(&make_frame_bytes(b"first"));
        combined.extend_from_slice(&make_frame_bytes(b"second"));
        combined.extend_from_slice(&make_frame_bytes(b"third"));
        buffer.extend(&combined);

        let frames = drain(&mut buffer);

        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..], b"first");
        assert_eq!(&frames[1][..], b"second");
        assert_eq!(&frames[2][..], b"third");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(b"test");

        buffer.extend(&frame_bytes[..2]);
        assert!(buffer.next_frame().unwrap().is_none());
        assert_eq!(buffer.state_name(), "WaitingForHeader");

        buffer.extend(&frame_bytes[2..]);
        let frames = drain(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"test");
    }

    #[test]
    fn test_fragmented_body() {
        let mut buffer = FrameBuffer::new();
        let body = b"this is a longer body that will be fragmented";
        let frame_bytes = make_frame_bytes(body);

        let partial_len = HEADER_WIDTH + 10;
        buffer.extend(&frame_bytes[..partial_len]);
        assert!(buffer.next_frame().unwrap().is_none());
        assert_eq!(buffer.state_name(), "WaitingForBody");

        buffer.extend(&frame_bytes[partial_len..]);
        let frames = drain(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], body);
    }

    #[test]
    fn test_empty_body() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(b"0000");

        let frame = buffer.next_frame().unwrap().unwrap();
        assert!(frame.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");
    }

    #[test]
    fn test_max_body() {
        let mut buffer = FrameBuffer::new();
        let body = vec![0xAB; MAX_BODY_LEN];
        buffer.extend(&make_frame_bytes(&body));

        let frame = buffer.next_frame().unwrap().unwrap();
        assert_eq!(frame.len(), MAX_BODY_LEN);
    }

    #[test]
    fn test_malformed_header_after_good_frame() {
        let mut buffer = FrameBuffer::new();
        let mut data = make_frame_bytes(b"ok");
        data.extend_from_slice(b"xx12");
        buffer.extend(&data);

        assert_eq!(&buffer.next_frame().unwrap().unwrap()[..], b"ok");
        assert!(matches!(
            buffer.next_frame(),
            Err(RpcError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_finish_reports_truncated_body() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(b"9999");
        buffer.extend(&[b'z'; 50]);

        assert!(buffer.next_frame().unwrap().is_none());
        assert!(matches!(
            buffer.finish(),
            Err(RpcError::ShortRead {
                expected: 9999,
                received: 50
            })
        ));
    }

    #[test]
    fn test_finish_reports_truncated_header() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(b"00");

        assert!(matches!(
            buffer.finish(),
            Err(RpcError::ShortRead {
                expected: 4,
                received: 2
            })
        ));
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = FrameBuffer::new();

        let frame1 = make_frame_bytes(b"first");
        let frame2 = make_frame_bytes(b"second");

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2[..5]);
        buffer.extend(&data);

        let frames = drain(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"first");
        assert_eq!(buffer.state_name(), "WaitingForBody");

        buffer.extend(&frame2[5..]);
        let frames = drain(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"second");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(b"hi");

        let mut all_frames = Vec::new();
        for byte in &frame_bytes {
            buffer.extend(&[*byte]);
            all_frames.extend(drain(&mut buffer));
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(&all_frames[0][..], b"hi");
    }
}
