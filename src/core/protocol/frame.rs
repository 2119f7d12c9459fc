// src/core/protocol/frame.rs

//! Implements the NUL-terminated JSON record framing used by both the
//! client and the peer wire protocols, and the corresponding `Encoder` and
//! `Decoder` for network communication.

use crate::core::errors::ChatError;
use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};

/// The single NUL byte that terminates every record.
const RECORD_TERMINATOR: u8 = 0;

/// Protocol-level limit to prevent unbounded buffer growth from a malicious
/// or malformed peer that never sends a terminator.
const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// A `tokio_util::codec` implementation for encoding and decoding
/// NUL-terminated JSON records, used for both client and peer connections.
#[derive(Debug, Default)]
pub struct ChatFrameCodec;

impl Encoder<Value> for ChatFrameCodec {
    type Error = ChatError;

    /// Encodes a JSON value into `dst`, followed by the NUL terminator.
    fn encode(&mut self, item: Value, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = serde_json::to_vec(&item)?;
        dst.extend_from_slice(&bytes);
        dst.put_u8(RECORD_TERMINATOR);
        Ok(())
    }
}

impl Decoder for ChatFrameCodec {
    type Item = Value;
    type Error = ChatError;

    /// Decodes one JSON record from `src`, returning `Ok(None)` if no
    /// complete NUL-terminated record is present yet, allowing the `Framed`
    /// stream to wait for more data from the network. Residual bytes after a
    /// decoded record remain in the buffer for the next call.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(terminator_at) = src.iter().position(|&b| b == RECORD_TERMINATOR) else {
            if src.len() > MAX_RECORD_SIZE {
                return Err(ChatError::MalformedRequest(
                    "record exceeds maximum size without a terminator".to_string(),
                ));
            }
            return Ok(None);
        };

        let record = src.split_to(terminator_at);
        src.advance(1); // consume the terminator itself

        let value: Value = serde_json::from_slice(&record)?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_waits_for_full_record() {
        let mut codec = ChatFrameCodec;
        let mut buf = BytesMut::from(&b"{\"version\":0"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn round_trips_a_record() {
        let mut codec = ChatFrameCodec;
        let mut buf = BytesMut::new();
        let value = json!({"version": 0, "command": "ping", "data": {}});
        codec.encode(value.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, value);
        assert!(buf.is_empty());
    }

    #[test]
    fn leaves_residual_bytes_for_the_next_record() {
        let mut codec = ChatFrameCodec;
        let mut buf = BytesMut::new();
        codec.encode(json!({"a": 1}), &mut buf).unwrap();
        codec.encode(json!({"b": 2}), &mut buf).unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, json!({"a": 1}));
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second, json!({"b": 2}));
    }
}
