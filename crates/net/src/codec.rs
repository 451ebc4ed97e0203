//! Message encoding and decoding with framing.
//!
//! Frame format: `[length: u32 LE][message_type: u8][postcard payload]`,
//! where `length` counts the tag byte and the payload.

use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_MAGIC, PROTOCOL_VERSION};
use crate::ProtocolError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Largest accepted frame body, tag included.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

const LENGTH_PREFIX: usize = 4;

/// Compute schema hash from protocol definitions.
///
/// This hash is used to ensure client and server have compatible protocol versions.
pub fn compute_schema_hash() -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&PROTOCOL_VERSION.to_le_bytes());
    hasher.update(PROTOCOL_MAGIC);

    // Message type names, in a fixed order.
    hasher.update(b"ClientMessage");
    hasher.update(b"ServerMessage");
    hasher.update(b"ComponentPayload");
    hasher.update(b"ConditionPayload");

    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

fn encode<T: Serialize>(tag: u8, msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload = postcard::to_allocvec(msg)?;
    let length = 1 + payload.len();
    if length > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(length));
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX + length);
    frame.extend_from_slice(&(length as u32).to_le_bytes());
    frame.push(tag);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Split a frame into its tag and payload, checking the length prefix.
fn split_frame(data: &[u8]) -> Result<(u8, &[u8]), ProtocolError> {
    if data.len() < LENGTH_PREFIX + 1 {
        return Err(ProtocolError::FrameTooShort(data.len()));
    }
    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if length == 0 {
        return Err(ProtocolError::FrameTooShort(data.len()));
    }
    if length > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(length));
    }
    let expected = LENGTH_PREFIX + length;
    if data.len() != expected {
        return Err(ProtocolError::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }
    Ok((data[LENGTH_PREFIX], &data[LENGTH_PREFIX + 1..]))
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    let (msg, rest) = postcard::take_from_bytes(payload)?;
    if !rest.is_empty() {
        return Err(ProtocolError::TrailingBytes(rest.len()));
    }
    Ok(msg)
}

/// Encode a client message with length prefix.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    encode(msg.tag(), msg)
}

/// Encode a server message with length prefix.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    encode(msg.tag(), msg)
}

/// Decode and verify one client frame.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let (tag, payload) = split_frame(data)?;
    let msg: ClientMessage = decode(payload)?;
    if msg.tag() != tag {
        return Err(ProtocolError::TagMismatch { tag });
    }
    msg.verify()?;
    Ok(msg)
}

/// Decode and verify one server frame.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let (tag, payload) = split_frame(data)?;
    let msg: ServerMessage = decode(payload)?;
    if msg.tag() != tag {
        return Err(ProtocolError::TagMismatch { tag });
    }
    msg.verify()?;
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ConditionPayload;
    use scapes_core::EntityId;

    #[test]
    fn schema_hash_is_stable() {
        assert_eq!(compute_schema_hash(), compute_schema_hash());
        assert_ne!(compute_schema_hash(), 0);
    }

    #[test]
    fn encode_decode_handshake() {
        let msg = ClientMessage::Handshake {
            version: PROTOCOL_VERSION,
            schema_hash: compute_schema_hash(),
        };
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(decode_client_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn encode_decode_day_time_sync() {
        let msg = ServerMessage::DayTimeSync {
            day_time: 0.625,
            day: -4,
        };
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(encoded[4], 1);
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn encode_decode_condition_sync() {
        let msg = ServerMessage::condition(
            EntityId(12),
            ConditionPayload {
                stamina: 0.5,
                wake: 0.25,
                hunger: 1.0,
                thirst: 0.75,
                body_temperature: 36.5,
                sleeping: true,
            },
        );
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn invalid_anvil_action_is_a_protocol_error() {
        // Encoding does not validate; decoding does.
        let encoded = encode_client_message(&ClientMessage::AnvilAction { action: 9 }).unwrap();
        assert!(matches!(
            decode_client_message(&encoded),
            Err(ProtocolError::Invalid(_))
        ));
    }

    #[test]
    fn tag_must_match_payload() {
        let mut encoded = encode_client_message(&ClientMessage::Jump).unwrap();
        encoded[4] = 4;
        assert!(matches!(
            decode_client_message(&encoded),
            Err(ProtocolError::TagMismatch { tag: 4 })
        ));
    }

    #[test]
    fn incomplete_and_short_frames() {
        assert!(matches!(
            decode_client_message(&[10, 0, 0, 0]),
            Err(ProtocolError::FrameTooShort(4))
        ));
        assert!(matches!(
            decode_client_message(&[10, 0, 0, 0, 2]),
            Err(ProtocolError::LengthMismatch { expected: 14, actual: 5 })
        ));
    }

    #[test]
    fn oversized_length_is_rejected_before_reading() {
        let mut frame = (u32::MAX).to_le_bytes().to_vec();
        frame.push(0);
        assert!(matches!(
            decode_server_message(&frame),
            Err(ProtocolError::FrameTooLarge(_))
        ));
    }
}
