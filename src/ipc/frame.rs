//! Framed transport for the RPC wire protocol.
//!
//! Frame format:
//! ```text
//! ┌──────────────┬──────────────┬────────────────────────┐
//! │ len (2B)     │ crc16 (2B)   │   encoded message      │
//! │ u16 LE       │ u16 LE       │                        │
//! └──────────────┴──────────────┴────────────────────────┘
//! ```
//! Length covers the message only, NOT the 4-byte header. The checksum is
//! computed over the message bytes.

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::ipc::crc16;
use crate::types::FrameError;

/// Size of the length + checksum header.
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest payload the length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Read one frame from the stream.
///
/// Returns the verified payload, or `None` on clean EOF before a header.
/// `max_frame_bytes` caps the accepted payload size. A checksum mismatch
/// consumes the whole frame, so the stream stays aligned for the next read.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_frame_bytes: u32,
) -> Result<Option<Vec<u8>>, FrameError> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let (length, expected) = parse_header(&header, max_frame_bytes)?;

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;
    verify(&payload, expected)?;

    Ok(Some(payload))
}

/// Split one complete frame off the front of `buf`.
///
/// Returns `None` while the frame is still incomplete; nothing is consumed
/// in that case, so callers can keep appending to `buf` across cancelled
/// reads. A checksum mismatch consumes the bad frame.
pub fn decode_frame(buf: &mut BytesMut, max_frame_bytes: u32) -> Result<Option<Bytes>, FrameError> {
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }
    let (length, expected) = parse_header(&buf[..FRAME_HEADER_LEN], max_frame_bytes)?;
    if buf.len() < FRAME_HEADER_LEN + length {
        buf.reserve(FRAME_HEADER_LEN + length - buf.len());
        return Ok(None);
    }

    buf.advance(FRAME_HEADER_LEN);
    let payload = buf.split_to(length).freeze();
    verify(&payload, expected)?;
    Ok(Some(payload))
}

fn parse_header(header: &[u8], max_frame_bytes: u32) -> Result<(usize, u16), FrameError> {
    let length = usize::from(u16::from_le_bytes([header[0], header[1]]));
    let expected = u16::from_le_bytes([header[2], header[3]]);

    let limit = max_frame_bytes as usize;
    if length > limit {
        return Err(FrameError::FrameTooLarge { length, limit });
    }
    Ok((length, expected))
}

fn verify(payload: &[u8], expected: u16) -> Result<(), FrameError> {
    let actual = crc16::checksum(payload);
    if actual != expected {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

/// Write one frame to the stream.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), FrameError> {
    let length =
        u16::try_from(payload.len()).map_err(|_| FrameError::DataTooLong(payload.len()))?;
    let mut header = [0u8; FRAME_HEADER_LEN];
    header[..2].copy_from_slice(&length.to_le_bytes());
    header[2..].copy_from_slice(&crc16::checksum(payload).to_le_bytes());

    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
