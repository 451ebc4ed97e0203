#![warn(missing_docs)]
//! Wire protocol shared by the scapes client and server.

mod codec;
mod protocol;

pub use codec::{
    compute_schema_hash, decode_client_message, decode_server_message, encode_client_message,
    encode_server_message, MAX_FRAME_LEN,
};
pub use protocol::{
    ClientMessage, ComponentPayload, ConditionPayload, ServerMessage, ANVIL_ACTION_COUNT,
    CONDITION_COMPONENT, MAX_REASON_LEN, MAX_TYPE_ID_LEN, PROTOCOL_MAGIC, PROTOCOL_VERSION,
    TORNADO_ENTITY,
};

use thiserror::Error;

/// Fault in a received or outgoing frame.
///
/// Receiving one of these from a session disconnects that session only.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame shorter than its header.
    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),
    /// Length prefix above [`MAX_FRAME_LEN`].
    #[error("frame too large: {0} bytes (max {MAX_FRAME_LEN})")]
    FrameTooLarge(usize),
    /// Length prefix disagrees with the frame size.
    #[error("frame length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Size announced by the prefix.
        expected: usize,
        /// Size received.
        actual: usize,
    },
    /// Tag byte names a different message than the payload holds.
    #[error("message tag {tag} does not match payload")]
    TagMismatch {
        /// Received tag.
        tag: u8,
    },
    /// Payload continues after the message.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
    /// Postcard could not (de)serialize the payload.
    #[error("malformed payload: {0}")]
    Malformed(#[from] postcard::Error),
    /// Decoded message violates protocol limits.
    #[error("invalid message: {0}")]
    Invalid(&'static str),
}
