//! Wire format encoding and decoding.
//!
//! Every message on the stream is a fixed-width ASCII length header followed
//! by exactly that many body bytes:
//! ```text
//! ┌──────────────────────┬──────────────────────────┐
//! │ Length               │ Body                     │
//! │ 4 bytes, ASCII 0-9   │ `Length` bytes           │
//! │ zero-padded decimal  │ codec-encoded Envelope   │
//! └──────────────────────┴──────────────────────────┘
//! ```
//!
//! The header width is a protocol constant, so [`MAX_BODY_LEN`] (9999) is a
//! hard ceiling on any single request or response.

use crate::error::{Result, RpcError};

/// Header width in bytes (fixed, exactly 4).
pub const HEADER_WIDTH: usize = 4;

/// Largest body length representable in the header (10^4 - 1).
pub const MAX_BODY_LEN: usize = 9999;

/// Render a body length as a zero-padded decimal header.
///
/// # Errors
///
/// Returns [`RpcError::FrameTooLarge`] when `len` needs more than
/// [`HEADER_WIDTH`] digits.
///
/// # Example
///
/// ```
/// use wirepool::protocol::encode_header;
///
/// assert_eq!(&encode_header(42).unwrap(), b"0042");
/// assert!(encode_header(10_000).is_err());
/// ```
pub fn encode_header(len: usize) -> Result<[u8; HEADER_WIDTH]> {
    if len > MAX_BODY_LEN {
        return Err(RpcError::FrameTooLarge {
            len,
            max: MAX_BODY_LEN,
        });
    }

    let mut buf = [b'0'; HEADER_WIDTH];
    let mut rest = len;
    for slot in buf.iter_mut().rev() {
        *slot = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    Ok(buf)
}

/// Parse a header into a body length.
///
/// Only ASCII digits are accepted; signs, whitespace or any other byte make
/// the header malformed.
///
/// # Errors
///
/// - [`RpcError::ShortRead`] if fewer than [`HEADER_WIDTH`] bytes are given.
/// - [`RpcError::MalformedHeader`] if any header byte is not a digit.
pub fn decode_header(buf: &[u8]) -> Result<usize> {
    if buf.len() < HEADER_WIDTH {
        return Err(RpcError::ShortRead {
            expected: HEADER_WIDTH,
            received: buf.len(),
        });
    }

    let header = &buf[..HEADER_WIDTH];
    header.iter().try_fold(0usize, |acc, &b| {
        if b.is_ascii_digit() {
            Ok(acc * 10 + (b - b'0') as usize)
        } else {
            Err(RpcError::MalformedHeader(format!(
                "{:?}",
                String::from_utf8_lossy(header)
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_zero_padded() {
        assert_eq!(&encode_header(0).unwrap(), b"0000");
        assert_eq!(&encode_header(7).unwrap(), b"0007");
        assert_eq!(&encode_header(123).unwrap(), b"0123");
        assert_eq!(&encode_header(9999).unwrap(), b"9999");
    }

    #[test]
    fn test_header_capacity_boundary() {
        assert!(encode_header(MAX_BODY_LEN).is_ok());

        let err = encode_header(MAX_BODY_LEN + 1).unwrap_err();
        assert!(matches!(
            err,
            RpcError::FrameTooLarge {
                len: 10_000,
                max: 9999
            }
        ));
    }

    #[test]
    fn test_decode_header() {
        assert_eq!(decode_header(b"0000").unwrap(), 0);
        assert_eq!(decode_header(b"0042").unwrap(), 42);
        assert_eq!(decode_header(b"9999").unwrap(), 9999);
    }

    #[test]
    fn test_decode_ignores_bytes_past_header() {
        assert_eq!(decode_header(b"0005hello").unwrap(), 5);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let err = decode_header(b"004").unwrap_err();
        assert!(matches!(
            err,
            RpcError::ShortRead {
                expected: 4,
                received: 3
            }
        ));
    }

    #[test]
    fn test_decode_rejects_non_digits() {
        for bad in [&b"00a1"[..], b"+123", b"-001", b" 12 ", b"\0\0\0\0"] {
            let err = decode_header(bad).unwrap_err();
            assert!(
                matches!(err, RpcError::MalformedHeader(_)),
                "{:?} should be malformed",
                bad
            );
        }
    }

    #[test]
    fn test_header_width_is_exactly_4() {
        assert_eq!(HEADER_WIDTH, 4);
        assert_eq!(encode_header(1).unwrap().len(), 4);
    }
}
