//! Per-connection protocol state machine.

use std::sync::Arc;

use glam::DVec3;
use scapes_core::EntityId;
use scapes_net::{
    compute_schema_hash, decode_client_message, ClientMessage, ServerMessage, PROTOCOL_VERSION,
};
use tracing::{debug, info, warn};

use crate::mob::{MobLivingServer, Punch};
use crate::world::WorldServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Active,
    Closed,
}

/// One client connection bound to a persistent player id.
///
/// Replies meant for this connection only are returned from
/// [`Session::handle_frame`]; world-wide traffic goes through the outbox.
pub struct Session {
    player_id: EntityId,
    state: SessionState,
    mob: Option<Arc<MobLivingServer>>,
}

impl Session {
    pub fn new(player_id: EntityId) -> Self {
        Self {
            player_id,
            state: SessionState::AwaitingHandshake,
            mob: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn player_id(&self) -> EntityId {
        self.player_id
    }

    pub fn mob(&self) -> Option<&Arc<MobLivingServer>> {
        self.mob.as_ref()
    }

    /// Process one received frame.
    ///
    /// A frame that fails to decode or validate closes this session only.
    pub fn handle_frame(&mut self, world: &WorldServer, frame: &[u8]) -> Vec<ServerMessage> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        match decode_client_message(frame) {
            Ok(msg) => self.handle_message(world, msg),
            Err(err) => {
                warn!(player = %self.player_id, error = %err, "invalid packet");
                self.close(world, "invalid packet")
            }
        }
    }

    fn handle_message(&mut self, world: &WorldServer, msg: ClientMessage) -> Vec<ServerMessage> {
        match (self.state, msg) {
            (
                SessionState::AwaitingHandshake,
                ClientMessage::Handshake {
                    version,
                    schema_hash,
                },
            ) => self.handshake(world, version, schema_hash),
            (SessionState::AwaitingHandshake, other) => {
                warn!(player = %self.player_id, ?other, "packet before handshake");
                self.close(world, "handshake required")
            }
            (SessionState::Active, ClientMessage::Handshake { .. }) => {
                warn!(player = %self.player_id, "repeated handshake");
                self.close(world, "unexpected handshake")
            }
            (SessionState::Active, ClientMessage::Disconnect { reason }) => {
                info!(player = %self.player_id, %reason, "client disconnected");
                self.leave(world);
                Vec::new()
            }
            (SessionState::Active, msg) => {
                if let Some(mob) = &self.mob {
                    route(mob, msg);
                }
                Vec::new()
            }
            (SessionState::Closed, _) => Vec::new(),
        }
    }

    fn handshake(&mut self, world: &WorldServer, version: u16, schema_hash: u64) -> Vec<ServerMessage> {
        let reason = if version != PROTOCOL_VERSION {
            Some(format!(
                "protocol version mismatch: server {PROTOCOL_VERSION}, client {version}"
            ))
        } else if schema_hash != compute_schema_hash() {
            Some("protocol schema mismatch".to_string())
        } else {
            None
        };
        if let Some(reason) = reason {
            warn!(player = %self.player_id, %reason, "handshake rejected");
            self.state = SessionState::Closed;
            return vec![ServerMessage::HandshakeResponse {
                accepted: false,
                reason: Some(reason),
                player_entity_id: None,
            }];
        }

        let mob = match world.join_player(self.player_id) {
            Ok(mob) => mob,
            Err(err) => {
                warn!(player = %self.player_id, error = %err, "failed to join world");
                self.state = SessionState::Closed;
                return vec![ServerMessage::HandshakeResponse {
                    accepted: false,
                    reason: Some("failed to join world".to_string()),
                    player_entity_id: None,
                }];
            }
        };
        self.mob = Some(mob);
        self.state = SessionState::Active;
        debug!(player = %self.player_id, "handshake accepted");
        vec![
            ServerMessage::HandshakeResponse {
                accepted: true,
                reason: None,
                player_entity_id: Some(self.player_id),
            },
            world.day_time_sync(),
        ]
    }

    fn close(&mut self, world: &WorldServer, reason: &str) -> Vec<ServerMessage> {
        self.leave(world);
        vec![ServerMessage::Disconnect {
            reason: reason.to_string(),
        }]
    }

    /// Detach from the world; safe to call more than once.
    pub fn leave(&mut self, world: &WorldServer) {
        self.state = SessionState::Closed;
        if self.mob.take().is_some() {
            if let Err(err) = world.leave_player(self.player_id) {
                warn!(player = %self.player_id, error = %err, "failed to save player");
            }
        }
    }
}

fn route(mob: &MobLivingServer, msg: ClientMessage) {
    match msg {
        ClientMessage::PlayerState { position, velocity } => {
            mob.set_motion(DVec3::from_array(position), DVec3::from_array(velocity));
        }
        ClientMessage::Jump => mob.jump(),
        ClientMessage::Punch {
            strength,
            single_handed,
        } => mob.punch(Punch {
            strength,
            single_handed,
        }),
        ClientMessage::AnvilAction { action } => {
            debug!(entity = %mob.id(), action, "anvil action");
        }
        ClientMessage::Handshake { .. } | ClientMessage::Disconnect { .. } => {}
    }
}
