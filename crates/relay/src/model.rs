use {
    crossover_common::{Endpoint, MessageId},
    serde::Serialize,
};

/// A rendezvous code owned by the endpoint that opened it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub id: String,
    pub origin: Endpoint,
    pub created_at: i64,
}

/// A directed `source → target` edge established through `room_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub id: i64,
    pub room_id: String,
    pub source: Endpoint,
    pub target: Endpoint,
}

/// Origin message → relayed copy on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageMapping {
    pub connection_id: i64,
    pub origin_message_id: MessageId,
    pub cloned_message_id: MessageId,
}

/// A relayed copy together with the connection it went out on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedClone {
    pub connection: Connection,
    pub cloned_message_id: MessageId,
}

/// One `list` row: a room the endpoint participates in and who is on the
/// other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomLink {
    pub room_id: String,
    pub target: Endpoint,
}

impl From<Connection> for RoomLink {
    fn from(c: Connection) -> Self {
        Self {
            room_id: c.room_id,
            target: c.target,
        }
    }
}
