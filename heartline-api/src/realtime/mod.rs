//! Real-time delivery of new messages to the pair's room.
//!
//! The persisted log is authoritative; fan-out is best effort.

use async_trait::async_trait;
use socketioxide::SocketIo;

use crate::models::Message;

pub mod redis;
pub mod socket;

pub use self::redis::{spawn_relay, RedisFanout, RelayBackoff, RelayStatus};

pub const RECEIVE_MESSAGE: &str = "receiveMessage";

#[async_trait]
pub trait MessageFanout: Send + Sync {
    async fn publish(&self, room_id: &str, message: &Message) -> anyhow::Result<()>;
}

/// Liveness of the cross-instance delivery path, reported by `/health`.
#[async_trait]
pub trait FanoutHealth: Send + Sync {
    async fn check(&self) -> Result<(), String>;
}

/// Emits straight to sockets connected to this process.
#[derive(Clone)]
pub struct SocketIoFanout {
    io: SocketIo,
}

impl SocketIoFanout {
    pub fn new(io: SocketIo) -> Self {
        Self { io }
    }
}

#[async_trait]
impl MessageFanout for SocketIoFanout {
    async fn publish(&self, room_id: &str, message: &Message) -> anyhow::Result<()> {
        emit_to_room(&self.io, room_id, message)
    }
}

pub(crate) fn emit_to_room(io: &SocketIo, room_id: &str, message: &Message) -> anyhow::Result<()> {
    io.to(room_id.to_string())
        .emit(RECEIVE_MESSAGE, message)
        .map_err(|e| anyhow::anyhow!("emit to {room_id} failed: {e}"))
}
