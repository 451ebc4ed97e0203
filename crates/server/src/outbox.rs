//! Outgoing packet queue.

use scapes_core::EntityId;
use scapes_net::ServerMessage;
use tokio::sync::mpsc;
use tracing::trace;

/// Who receives a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected player of the world.
    All,
    /// One player.
    Player(EntityId),
}

/// Fire-and-forget sender of server packets; FIFO per receiver.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<(Recipient, ServerMessage)>,
}

/// Receiving end drained by the transport.
pub type OutboxReceiver = mpsc::UnboundedReceiver<(Recipient, ServerMessage)>;

impl Outbox {
    /// Create an outbox and the receiver the transport drains.
    pub fn channel() -> (Self, OutboxReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a packet. Packets queued after the receiver is gone are dropped.
    pub fn send(&self, recipient: Recipient, msg: ServerMessage) {
        if self.tx.send((recipient, msg)).is_err() {
            trace!(?recipient, "outbox closed; packet dropped");
        }
    }

    /// Queue a packet for every player.
    pub fn broadcast(&self, msg: ServerMessage) {
        self.send(Recipient::All, msg);
    }
}
