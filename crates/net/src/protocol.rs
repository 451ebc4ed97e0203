//! Protocol message definitions for client-server communication.
//!
//! All messages use postcard serialization for compact binary encoding.

use scapes_core::EntityId;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u16 = 1;

/// Protocol magic bytes identifying the scapes protocol.
pub const PROTOCOL_MAGIC: &[u8; 8] = b"SCAPES\x00\x01";

/// Component id of the condition sync payload.
pub const CONDITION_COMPONENT: &str = "VanillaBasics:Condition";

/// Entity type id of a tornado spawned by the weather.
pub const TORNADO_ENTITY: &str = "VanillaBasics:Tornado";

/// Maximum length of a disconnect reason (bytes).
pub const MAX_REASON_LEN: usize = 256;

/// Maximum length of a component or entity type id (bytes).
pub const MAX_TYPE_ID_LEN: usize = 64;

/// Anvil action ids are `0..ANVIL_ACTION_COUNT`.
pub const ANVIL_ACTION_COUNT: u8 = 8;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientMessage {
    /// Handshake request with protocol version and schema hash.
    Handshake {
        /// Protocol version.
        version: u16,
        /// Schema hash for compatibility.
        schema_hash: u64,
    },

    /// Authoritative-enough movement state of the player.
    PlayerState {
        /// World position (x, y horizontal, z up).
        position: [f64; 3],
        /// Velocity in blocks per second.
        velocity: [f64; 3],
    },

    /// The player jumped.
    Jump,

    /// The player punched.
    Punch {
        /// Swing strength, `[0, 1]`.
        strength: f64,
        /// Whether only one hand was used.
        single_handed: bool,
    },

    /// Anvil smithing action.
    AnvilAction {
        /// Action id, `0..ANVIL_ACTION_COUNT`.
        action: u8,
    },

    /// Client disconnect notification.
    Disconnect {
        /// Reason for disconnect.
        reason: String,
    },
}

fn finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

impl ClientMessage {
    /// Verify message limits and validity.
    ///
    /// Called on every received message; a failure disconnects the sender.
    pub fn verify(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMessage::PlayerState { position, velocity } => {
                if !finite(position) || !finite(velocity) {
                    return Err(ProtocolError::Invalid("non-finite player state"));
                }
            }
            ClientMessage::Punch { strength, .. } => {
                if !(0.0..=1.0).contains(strength) {
                    return Err(ProtocolError::Invalid("punch strength out of range"));
                }
            }
            ClientMessage::AnvilAction { action } => {
                if *action >= ANVIL_ACTION_COUNT {
                    return Err(ProtocolError::Invalid("anvil action out of range"));
                }
            }
            ClientMessage::Disconnect { reason } => {
                if reason.len() > MAX_REASON_LEN {
                    return Err(ProtocolError::Invalid("disconnect reason too long"));
                }
            }
            ClientMessage::Handshake { .. } | ClientMessage::Jump => {}
        }
        Ok(())
    }

    pub(crate) fn tag(&self) -> u8 {
        match self {
            ClientMessage::Handshake { .. } => 0,
            ClientMessage::PlayerState { .. } => 1,
            ClientMessage::Jump => 2,
            ClientMessage::Punch { .. } => 3,
            ClientMessage::AnvilAction { .. } => 4,
            ClientMessage::Disconnect { .. } => 5,
        }
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerMessage {
    /// Handshake response accepting or rejecting connection.
    HandshakeResponse {
        /// Whether handshake was accepted.
        accepted: bool,
        /// Reason for rejection (if not accepted).
        reason: Option<String>,
        /// Assigned entity ID for the player.
        player_entity_id: Option<EntityId>,
    },

    /// Authoritative climate clock; the client applies the latest one.
    DayTimeSync {
        /// Fraction of the day, `[0, 1)`.
        day_time: f32,
        /// Day counter.
        day: i64,
    },

    /// Component state of one entity.
    ComponentSync {
        /// Entity owning the component.
        entity: EntityId,
        /// Component id, e.g. [`CONDITION_COMPONENT`].
        component: String,
        /// Component fields.
        payload: ComponentPayload,
    },

    /// A lightning strike.
    Lightning {
        /// Strike position.
        position: [f64; 3],
    },

    /// An entity appeared in the world.
    EntitySpawn {
        /// New entity.
        entity: EntityId,
        /// Entity type id, e.g. [`TORNADO_ENTITY`].
        kind: String,
        /// Spawn position.
        position: [f64; 3],
    },

    /// Server-side disconnect.
    Disconnect {
        /// Reason shown to the player.
        reason: String,
    },
}

impl ServerMessage {
    /// Condition sync packet for `entity`.
    pub fn condition(entity: EntityId, payload: ConditionPayload) -> Self {
        ServerMessage::ComponentSync {
            entity,
            component: CONDITION_COMPONENT.to_string(),
            payload: ComponentPayload::Condition(payload),
        }
    }

    /// Verify message limits; clients run this on receipt.
    pub fn verify(&self) -> Result<(), ProtocolError> {
        match self {
            ServerMessage::HandshakeResponse {
                reason: Some(reason),
                ..
            }
            | ServerMessage::Disconnect { reason } => {
                if reason.len() > MAX_REASON_LEN {
                    return Err(ProtocolError::Invalid("reason too long"));
                }
            }
            ServerMessage::DayTimeSync { day_time, .. } => {
                if !day_time.is_finite() {
                    return Err(ProtocolError::Invalid("non-finite day time"));
                }
            }
            ServerMessage::ComponentSync { component, .. } => {
                if component.len() > MAX_TYPE_ID_LEN {
                    return Err(ProtocolError::Invalid("component id too long"));
                }
            }
            ServerMessage::EntitySpawn { kind, .. } => {
                if kind.len() > MAX_TYPE_ID_LEN {
                    return Err(ProtocolError::Invalid("entity type too long"));
                }
            }
            ServerMessage::HandshakeResponse { reason: None, .. }
            | ServerMessage::Lightning { .. } => {}
        }
        Ok(())
    }

    pub(crate) fn tag(&self) -> u8 {
        match self {
            ServerMessage::HandshakeResponse { .. } => 0,
            ServerMessage::DayTimeSync { .. } => 1,
            ServerMessage::ComponentSync { .. } => 2,
            ServerMessage::Lightning { .. } => 3,
            ServerMessage::EntitySpawn { .. } => 4,
            ServerMessage::Disconnect { .. } => 5,
        }
    }
}

/// Payloads of [`ServerMessage::ComponentSync`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ComponentPayload {
    /// Living-creature condition.
    Condition(ConditionPayload),
}

/// Condition fields as shown on the client HUD.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConditionPayload {
    /// Stamina, `[0, 1]`.
    pub stamina: f64,
    /// Wakefulness, `[0, 1]`.
    pub wake: f64,
    /// Satiation, `[0, 1]`.
    pub hunger: f64,
    /// Hydration, `[0, 1]`.
    pub thirst: f64,
    /// Body temperature in °C.
    pub body_temperature: f64,
    /// Whether the entity sleeps.
    pub sleeping: bool,
}
