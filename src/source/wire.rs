//! Feed wire protocol
//!
//! Messages are multipart, mirroring the pub/sub feed they carry:
//!
//! ```text
//! message = part-count(u8) , part{part-count}
//! part    = length(u32 BE) , payload(length bytes)
//! ```
//!
//! A frame message has three parts: subject (UTF-8), frame selector
//! (u32 BE), and the raw RGBA pixel buffer. Decoding is incremental:
//! [`decode`] returns `Ok(None)` until a full message is buffered, and
//! splits payloads out of the receive buffer without copying.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Maximum number of parts in one message
pub const MAX_PARTS: u8 = 8;

/// Maximum length of a single part
pub const MAX_PART_LEN: usize = 64 * 1024 * 1024;

/// Parts in a frame message: subject, selector, pixels
pub const FRAME_PARTS: usize = 3;

/// Error type for wire decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Message declared zero parts or more than [`MAX_PARTS`]
    InvalidPartCount(u8),
    /// A part exceeded [`MAX_PART_LEN`]
    PartTooLarge(usize),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::InvalidPartCount(count) => write!(f, "Invalid part count: {}", count),
            WireError::PartTooLarge(len) => write!(f, "Part too large: {} bytes", len),
        }
    }
}

impl std::error::Error for WireError {}

/// A decoded multipart message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message parts in wire order
    pub parts: Vec<Bytes>,
}

impl Message {
    /// Build a frame message: subject, selector, pixel buffer
    pub fn frame(subject: &str, selector: u32, pixels: Bytes) -> Self {
        Self {
            parts: vec![
                Bytes::copy_from_slice(subject.as_bytes()),
                Bytes::copy_from_slice(&selector.to_be_bytes()),
                pixels,
            ],
        }
    }

    /// Subject part, if present and valid UTF-8
    pub fn subject(&self) -> Option<&str> {
        self.parts.first().and_then(|p| std::str::from_utf8(p).ok())
    }

    /// Selector part, if present and exactly four bytes
    pub fn selector(&self) -> Option<u32> {
        let raw: [u8; 4] = self.parts.get(1)?.as_ref().try_into().ok()?;
        Some(u32::from_be_bytes(raw))
    }

    /// Encoded size of this message on the wire
    pub fn encoded_len(&self) -> usize {
        1 + self.parts.iter().map(|p| 4 + p.len()).sum::<usize>()
    }
}

/// Encode a message into `dst`
///
/// Callers keep messages within [`MAX_PARTS`] and [`MAX_PART_LEN`]; the
/// decoder on the other side rejects anything bigger.
pub fn encode(message: &Message, dst: &mut BytesMut) {
    dst.reserve(message.encoded_len());
    dst.put_u8(message.parts.len() as u8);
    for part in &message.parts {
        dst.put_u32(part.len() as u32);
        dst.put_slice(part);
    }
}

/// Decode one message from `src`, consuming its bytes
///
/// Returns `Ok(None)` when `src` does not yet hold a complete message; the
/// buffer is left untouched so the caller can read more and retry.
pub fn decode(src: &mut BytesMut) -> Result<Option<Message>, WireError> {
    if src.is_empty() {
        return Ok(None);
    }

    let part_count = src[0];
    if part_count == 0 || part_count > MAX_PARTS {
        return Err(WireError::InvalidPartCount(part_count));
    }

    // First pass: confirm the whole message is buffered without consuming
    let mut offset = 1;
    for _ in 0..part_count {
        if src.len() < offset + 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([
            src[offset],
            src[offset + 1],
            src[offset + 2],
            src[offset + 3],
        ]) as usize;
        if len > MAX_PART_LEN {
            return Err(WireError::PartTooLarge(len));
        }
        offset += 4;
        if src.len() < offset + len {
            return Ok(None);
        }
        offset += len;
    }

    // Second pass: split the parts out of the buffer
    src.advance(1);
    let mut parts = Vec::with_capacity(part_count as usize);
    for _ in 0..part_count {
        let len = src.get_u32() as usize;
        parts.push(src.split_to(len).freeze());
    }

    Ok(Some(Message { parts }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Message {
        Message::frame("output", 7, Bytes::from_static(&[1, 2, 3, 4]))
    }

    #[test]
    fn test_frame_message_accessors() {
        let message = sample();

        assert_eq!(message.parts.len(), FRAME_PARTS);
        assert_eq!(message.subject(), Some("output"));
        assert_eq!(message.selector(), Some(7));
        assert_eq!(&message.parts[2][..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_encode_decode() {
        let message = sample();
        let mut buf = BytesMut::new();
        encode(&message, &mut buf);

        assert_eq!(buf.len(), message.encoded_len());

        let decoded = decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, message);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incremental() {
        let message = sample();
        let mut full = BytesMut::new();
        encode(&message, &mut full);

        // Every proper prefix is "need more data", never an error
        for cut in 0..full.len() {
            let mut partial = BytesMut::from(&full[..cut]);
            assert_eq!(decode(&mut partial).unwrap(), None, "cut at {}", cut);
            assert_eq!(partial.len(), cut, "prefix must be left untouched");
        }

        assert!(decode(&mut full).unwrap().is_some());
    }

    #[test]
    fn test_decode_pipelined_messages() {
        let first = Message::frame("output", 1, Bytes::from_static(b"aa"));
        let second = Message::frame("output", 2, Bytes::from_static(b"bb"));

        let mut buf = BytesMut::new();
        encode(&first, &mut buf);
        encode(&second, &mut buf);

        assert_eq!(decode(&mut buf).unwrap().unwrap(), first);
        assert_eq!(decode(&mut buf).unwrap().unwrap(), second);
        assert_eq!(decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_zero_part_count_rejected() {
        let mut buf = BytesMut::from(&[0u8][..]);

        assert_eq!(
            decode(&mut buf).unwrap_err(),
            WireError::InvalidPartCount(0)
        );
    }

    #[test]
    fn test_excessive_part_count_rejected() {
        let mut buf = BytesMut::from(&[MAX_PARTS + 1][..]);

        assert_eq!(
            decode(&mut buf).unwrap_err(),
            WireError::InvalidPartCount(MAX_PARTS + 1)
        );
    }

    #[test]
    fn test_oversized_part_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(1);
        buf.put_u32((MAX_PART_LEN + 1) as u32);

        assert!(matches!(
            decode(&mut buf).unwrap_err(),
            WireError::PartTooLarge(_)
        ));
    }
}
