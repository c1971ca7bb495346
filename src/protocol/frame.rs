//! Frame encoding and exact-length frame reads.
//!
//! A frame is `HEADER || BODY`, see [`wire_format`](super::wire_format).
//! [`read_frame`] pulls exactly one frame off a stream and is what the client
//! uses to wait for its single response. The server side buffers reads with
//! [`FrameBuffer`](super::FrameBuffer) instead.
//!
//! # Example
//!
//! ```
//! use wirepool::codec::MsgPackCodec;
//! use wirepool::protocol::{encode_frame, Envelope};
//!
//! let frame = encode_frame::<MsgPackCodec>(&Envelope::new("echo", vec![1, 2, 3])).unwrap();
//! assert!(frame[..4].iter().all(u8::is_ascii_digit));
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::wire_format::{decode_header, encode_header, HEADER_WIDTH};
use super::Envelope;
use crate::codec::Codec;
use crate::error::{Result, RpcError};

/// Encode an envelope into a complete frame (header + body).
///
/// # Errors
///
/// - [`RpcError::Encode`] if the envelope cannot be serialized.
/// - [`RpcError::FrameTooLarge`] if the body does not fit the header.
pub fn encode_frame<C: Codec>(envelope: &Envelope) -> Result<Bytes> {
    let body = envelope.to_body::<C>()?;
    build_frame(&body)
}

/// Prefix an already serialized body with its length header.
pub fn build_frame(body: &[u8]) -> Result<Bytes> {
    let header = encode_header(body.len())?;

    let mut frame = BytesMut::with_capacity(HEADER_WIDTH + body.len());
    frame.put_slice(&header);
    frame.put_slice(body);
    Ok(frame.freeze())
}

/// Decode a frame body (header already stripped) into an envelope.
#[inline]
pub fn decode_frame<C: Codec>(body: &[u8]) -> Result<Envelope> {
    Envelope::from_body::<C>(body)
}

/// Read exactly one frame body from `reader`.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly before the
/// first header byte.
///
/// # Errors
///
/// - [`RpcError::ShortRead`] if the stream ends inside the header or body.
/// - [`RpcError::MalformedHeader`] if the header is not decimal.
/// - [`RpcError::Io`] on socket errors.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_WIDTH];
    let got = read_full(reader, &mut header).await?;
    if got == 0 {
        return Ok(None);
    }
    if got < HEADER_WIDTH {
        return Err(RpcError::ShortRead {
            expected: HEADER_WIDTH,
            received: got,
        });
    }

    let len = decode_header(&header)?;
    let mut body = vec![0u8; len];
    let got = read_full(reader, &mut body).await?;
    if got < len {
        return Err(RpcError::ShortRead {
            expected: len,
            received: got,
        });
    }

    Ok(Some(Bytes::from(body)))
}

/// Write a complete frame and flush it.
///
/// Any I/O failure is reported as [`RpcError::Send`].
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await.map_err(RpcError::Send)?;
    writer.flush().await.map_err(RpcError::Send)
}

/// Fill `buf` until it is full or the stream ends; returns bytes read.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{JsonCodec, MsgPackCodec};
    use crate::protocol::MAX_BODY_LEN;
    use tokio::io::duplex;

    #[test]
    fn test_encode_frame_header_matches_body() {
        let envelope = Envelope::new("echo", b"hello".to_vec());
        let frame = encode_frame::<JsonCodec>(&envelope).unwrap();

        let body = envelope.to_body::<JsonCodec>().unwrap();
        assert_eq!(decode_header(&frame).unwrap(), body.len());
        assert_eq!(&frame[HEADER_WIDTH..], &body[..]);
    }

    #[test]
    fn test_build_frame_exact_capacity() {
        let body = vec![b'x'; MAX_BODY_LEN];
        let frame = build_frame(&body).unwrap();
        assert_eq!(&frame[..HEADER_WIDTH], b"9999");
        assert_eq!(frame.len(), HEADER_WIDTH + MAX_BODY_LEN);
    }

    #[test]
    fn test_build_frame_over_capacity() {
        let body = vec![b'x'; MAX_BODY_LEN + 1];
        assert!(matches!(
            build_frame(&body),
            Err(RpcError::FrameTooLarge { len: 10_000, .. })
        ));
    }

    #[test]
    fn test_encode_frame_too_large_payload() {
        let envelope = Envelope::new("upload", vec![0xAB; MAX_BODY_LEN]);
        assert!(matches!(
            encode_frame::<MsgPackCodec>(&envelope),
            Err(RpcError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_then_read_frame() {
        let (mut client, mut server) = duplex(4096);
        let envelope = Envelope::new("Login", vec![1, 2, 3]);
        let frame = encode_frame::<MsgPackCodec>(&envelope).unwrap();

        write_frame(&mut client, &frame).await.unwrap();

        let body = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(decode_frame::<MsgPackCodec>(&body).unwrap(), envelope);
    }

    #[tokio::test]
    async fn test_read_frame_clean_eof() {
        let (client, mut server) = duplex(64);
        drop(client);
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_short_header() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"00").await.unwrap();
        drop(client);

        assert!(matches!(
            read_frame(&mut server).await,
            Err(RpcError::ShortRead {
                expected: 4,
                received: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_read_frame_short_body() {
        let (mut client, mut server) = duplex(16 * 1024);
        client.write_all(b"9999").await.unwrap();
        client.write_all(&[b'z'; 50]).await.unwrap();
        drop(client);

        assert!(matches!(
            read_frame(&mut server).await,
            Err(RpcError::ShortRead {
                expected: 9999,
                received: 50
            })
        ));
    }

    #[tokio::test]
    async fn test_read_frame_malformed_header() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"12ab").await.unwrap();

        assert!(matches!(
            read_frame(&mut server).await,
            Err(RpcError::MalformedHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_read_frame_empty_body() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"0000").await.unwrap();

        let body = read_frame(&mut server).await.unwrap().unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_consecutive_frames_stay_aligned() {
        let (mut client, mut server) = duplex(4096);
        for name in ["first", "second", "third"] {
            let frame = encode_frame::<JsonCodec>(&Envelope::new(name, Vec::new())).unwrap();
            write_frame(&mut client, &frame).await.unwrap();
        }

        for name in ["first", "second", "third"] {
            let body = read_frame(&mut server).await.unwrap().unwrap();
            assert_eq!(decode_frame::<JsonCodec>(&body).unwrap().name, name);
        }
    }
}
