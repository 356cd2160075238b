use std::sync::Mutex;

use {
    async_trait::async_trait,
    crossover_common::{Endpoint, MessageId, types::now_ms},
};

use crate::{
    error::{Error, Result},
    model::{Connection, MappedClone, MessageMapping, Room},
    store::TopologyStore,
};

#[derive(Default)]
struct State {
    rooms: Vec<Room>,
    connections: Vec<Connection>,
    mappings: Vec<MessageMapping>,
    next_connection_id: i64,
}

impl State {
    fn exists(&self, source: Endpoint, target: Endpoint) -> bool {
        self.connections
            .iter()
            .any(|c| c.source == source && c.target == target)
    }

    fn push_connection(&mut self, room_id: &str, source: Endpoint, target: Endpoint) -> Connection {
        self.next_connection_id += 1;
        let conn = Connection {
            id: self.next_connection_id,
            room_id: room_id.to_string(),
            source,
            target,
        };
        self.connections.push(conn.clone());
        conn
    }
}

/// Process-local topology store for tests and ephemeral runs.
///
/// A single mutex guards all tables, so every operation is atomic. The lock
/// is never held across an `.await`.
#[derive(Default)]
pub struct InMemoryTopologyStore {
    state: Mutex<State>,
}

impl InMemoryTopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TopologyStore for InMemoryTopologyStore {
    async fn upsert_room(&self, origin: Endpoint, code: &str) -> Result<Room> {
        let mut state = self.lock();
        if let Some(room) = state.rooms.iter().find(|r| r.origin == origin) {
            return Ok(room.clone());
        }
        if state.rooms.iter().any(|r| r.id == code) {
            return Err(Error::RoomCodeTaken {
                code: code.to_string(),
            });
        }
        let room = Room {
            id: code.to_string(),
            origin,
            created_at: now_ms(),
        };
        state.rooms.push(room.clone());
        Ok(room)
    }

    async fn find_room(&self, code: &str) -> Result<Option<Room>> {
        Ok(self.lock().rooms.iter().find(|r| r.id == code).cloned())
    }

    async fn find_connection(&self, source: Endpoint, room_id: &str) -> Result<Option<Connection>> {
        Ok(self
            .lock()
            .connections
            .iter()
            .find(|c| c.source == source && c.room_id == room_id)
            .cloned())
    }

    async fn connection_exists(&self, source: Endpoint, target: Endpoint) -> Result<bool> {
        Ok(self.lock().exists(source, target))
    }

    async fn insert_connection_pair(
        &self,
        room_id: &str,
        a: Endpoint,
        b: Endpoint,
    ) -> Result<(Connection, Connection)> {
        if a == b {
            return Err(Error::SelfConnection { endpoint: a });
        }
        let mut state = self.lock();
        if !state.rooms.iter().any(|r| r.id == room_id) {
            return Err(Error::room_not_found(room_id));
        }
        if state.exists(a, b) || state.exists(b, a) {
            return Err(Error::AlreadyConnected { this: a, that: b });
        }
        let forward = state.push_connection(room_id, a, b);
        let backward = state.push_connection(room_id, b, a);
        Ok((forward, backward))
    }

    async fn delete_room_connections(&self, room_id: &str) -> Result<Vec<Connection>> {
        let mut state = self.lock();
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.connections)
            .into_iter()
            .partition(|c| c.room_id == room_id);
        state.connections = kept;
        state
            .mappings
            .retain(|m| !removed.iter().any(|c| c.id == m.connection_id));
        Ok(removed)
    }

    async fn connections_from(&self, source: Endpoint) -> Result<Vec<Connection>> {
        Ok(self
            .lock()
            .connections
            .iter()
            .filter(|c| c.source == source)
            .cloned()
            .collect())
    }

    async fn has_connections_from(&self, source: Endpoint) -> Result<bool> {
        Ok(self.lock().connections.iter().any(|c| c.source == source))
    }

    async fn connected_sources(&self) -> Result<Vec<Endpoint>> {
        let mut sources: Vec<Endpoint> = self.lock().connections.iter().map(|c| c.source).collect();
        sources.sort();
        sources.dedup();
        Ok(sources)
    }

    async fn room_links(&self, source: Endpoint) -> Result<Vec<Connection>> {
        let state = self.lock();
        let mut links: Vec<Connection> = Vec::new();
        for conn in state.connections.iter().filter(|c| c.source == source) {
            if !links.iter().any(|l| l.room_id == conn.room_id) {
                links.push(conn.clone());
            }
        }
        Ok(links)
    }

    async fn insert_mapping(&self, mapping: &MessageMapping) -> Result<()> {
        let mut state = self.lock();
        if !state.connections.iter().any(|c| c.id == mapping.connection_id) {
            return Err(Error::store(format!(
                "connection {} does not exist",
                mapping.connection_id
            )));
        }
        state.mappings.push(*mapping);
        Ok(())
    }

    async fn find_clones(
        &self,
        source: Endpoint,
        origin_message_id: MessageId,
    ) -> Result<Vec<MappedClone>> {
        let state = self.lock();
        Ok(state
            .mappings
            .iter()
            .filter(|m| m.origin_message_id == origin_message_id)
            .filter_map(|m| {
                state
                    .connections
                    .iter()
                    .find(|c| c.id == m.connection_id && c.source == source)
                    .map(|c| MappedClone {
                        connection: c.clone(),
                        cloned_message_id: m.cloned_message_id,
                    })
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conformance() {
        let store = InMemoryTopologyStore::new();
        crate::store::conformance::run_all(&store).await;
    }

    #[tokio::test]
    async fn mapping_requires_live_connection() {
        let store = InMemoryTopologyStore::new();
        let err = store
            .insert_mapping(&MessageMapping {
                connection_id: 42,
                origin_message_id: 1,
                cloned_message_id: 2,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store { .. }));
    }
}
