//! Topology store adapter.
//!
//! Rooms, directed connections, and message mappings are the single source of
//! truth for routing. Every multi-row change (pair insert, room teardown) is
//! atomic in each implementation.

mod memory;
mod sqlite;

use {
    async_trait::async_trait,
    crossover_common::{Endpoint, MessageId},
};

pub use {memory::InMemoryTopologyStore, sqlite::SqliteTopologyStore};

use crate::{
    error::Result,
    model::{Connection, MappedClone, MessageMapping, Room},
};

#[async_trait]
pub trait TopologyStore: Send + Sync {
    /// Return the room whose origin is `origin`, creating it with `code` when
    /// none exists. Fails with `RoomCodeTaken` when `code` belongs to another
    /// origin.
    async fn upsert_room(&self, origin: Endpoint, code: &str) -> Result<Room>;

    async fn find_room(&self, code: &str) -> Result<Option<Room>>;

    /// The connection `source` holds in room `room_id`, if any.
    async fn find_connection(&self, source: Endpoint, room_id: &str) -> Result<Option<Connection>>;

    /// Whether the directed row `source → target` exists.
    async fn connection_exists(&self, source: Endpoint, target: Endpoint) -> Result<bool>;

    /// Insert `a → b` and `b → a` in one transaction. Fails with
    /// `AlreadyConnected` if either row exists and `SelfConnection` if
    /// `a == b`; nothing is written on failure.
    async fn insert_connection_pair(
        &self,
        room_id: &str,
        a: Endpoint,
        b: Endpoint,
    ) -> Result<(Connection, Connection)>;

    /// Delete every connection of `room_id` in one transaction and return the
    /// removed rows. Their mappings go with them.
    async fn delete_room_connections(&self, room_id: &str) -> Result<Vec<Connection>>;

    /// All connections whose source is `source`.
    async fn connections_from(&self, source: Endpoint) -> Result<Vec<Connection>>;

    async fn has_connections_from(&self, source: Endpoint) -> Result<bool>;

    /// Every endpoint that is the source of at least one connection.
    async fn connected_sources(&self) -> Result<Vec<Endpoint>>;

    /// One connection per distinct room `source` participates in, oldest
    /// first.
    async fn room_links(&self, source: Endpoint) -> Result<Vec<Connection>>;

    async fn insert_mapping(&self, mapping: &MessageMapping) -> Result<()>;

    /// Relayed copies of `origin_message_id` made on connections leaving
    /// `source`.
    async fn find_clones(
        &self,
        source: Endpoint,
        origin_message_id: MessageId,
    ) -> Result<Vec<MappedClone>>;
}

/// Behaviour every store implementation must share, run by each backend's
/// own test module.
#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod conformance {
    use super::*;
    use crate::error::Error;

    const A: Endpoint = Endpoint::new(1, 10);
    const B: Endpoint = Endpoint::new(2, 20);
    const C: Endpoint = Endpoint::new(3, 30);

    pub async fn run_all(store: &dyn TopologyStore) {
        upsert_room_is_idempotent(store).await;
        room_code_collision(store).await;
        pair_insert(store).await;
        duplicate_pair_rejected(store).await;
        self_pair_rejected(store).await;
        room_links_dedupe_by_room(store).await;
        clones_are_scoped_by_source(store).await;
        delete_room_removes_everything(store).await;
    }

    async fn upsert_room_is_idempotent(store: &dyn TopologyStore) {
        let first = store.upsert_room(A, "aaaaaa").await.unwrap();
        let second = store.upsert_room(A, "zzzzzz").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.id, "aaaaaa");
        assert!(store.find_room("zzzzzz").await.unwrap().is_none());
        assert_eq!(store.find_room("aaaaaa").await.unwrap().unwrap().origin, A);
    }

    async fn room_code_collision(store: &dyn TopologyStore) {
        let err = store.upsert_room(B, "aaaaaa").await.unwrap_err();
        assert!(matches!(err, Error::RoomCodeTaken { .. }));
        let room = store.upsert_room(B, "bbbbbb").await.unwrap();
        assert_eq!(room.origin, B);
    }

    async fn pair_insert(store: &dyn TopologyStore) {
        let (ab, ba) = store.insert_connection_pair("aaaaaa", B, A).await.unwrap();
        assert_eq!((ab.source, ab.target), (B, A));
        assert_eq!((ba.source, ba.target), (A, B));
        assert_eq!(ab.room_id, ba.room_id);
        assert_ne!(ab.id, ba.id);

        assert!(store.connection_exists(A, B).await.unwrap());
        assert!(store.connection_exists(B, A).await.unwrap());
        assert!(store.has_connections_from(A).await.unwrap());
        assert!(!store.has_connections_from(C).await.unwrap());

        let found = store.find_connection(B, "aaaaaa").await.unwrap().unwrap();
        assert_eq!(found, ab);
        assert!(store.find_connection(C, "aaaaaa").await.unwrap().is_none());
    }

    async fn duplicate_pair_rejected(store: &dyn TopologyStore) {
        let err = store
            .insert_connection_pair("bbbbbb", A, B)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyConnected { .. }));
        // Nothing from the failed pair leaked in.
        assert_eq!(store.connections_from(A).await.unwrap().len(), 1);
        assert_eq!(store.connections_from(B).await.unwrap().len(), 1);
    }

    async fn self_pair_rejected(store: &dyn TopologyStore) {
        let err = store
            .insert_connection_pair("aaaaaa", A, A)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SelfConnection { .. }));
    }

    async fn room_links_dedupe_by_room(store: &dyn TopologyStore) {
        store.insert_connection_pair("aaaaaa", C, A).await.unwrap();

        // A now has two rows in room aaaaaa but one list entry.
        assert_eq!(store.connections_from(A).await.unwrap().len(), 2);
        let links = store.room_links(A).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].room_id, "aaaaaa");
        assert_eq!(links[0].target, B);

        let mut sources = store.connected_sources().await.unwrap();
        sources.sort();
        assert_eq!(sources, vec![A, B, C]);
    }

    async fn clones_are_scoped_by_source(store: &dyn TopologyStore) {
        let from_a = store.connections_from(A).await.unwrap();
        for (i, conn) in from_a.iter().enumerate() {
            store
                .insert_mapping(&MessageMapping {
                    connection_id: conn.id,
                    origin_message_id: 500,
                    cloned_message_id: 600 + i as u64,
                })
                .await
                .unwrap();
        }

        let clones = store.find_clones(A, 500).await.unwrap();
        assert_eq!(clones.len(), 2);
        assert_eq!(clones[0].cloned_message_id, 600);
        assert_eq!(clones[1].cloned_message_id, 601);
        assert!(clones.iter().all(|c| c.connection.source == A));

        assert!(store.find_clones(B, 500).await.unwrap().is_empty());
        assert!(store.find_clones(A, 501).await.unwrap().is_empty());
    }

    async fn delete_room_removes_everything(store: &dyn TopologyStore) {
        let removed = store.delete_room_connections("aaaaaa").await.unwrap();
        assert_eq!(removed.len(), 4);
        assert!(store.connections_from(A).await.unwrap().is_empty());
        assert!(store.connected_sources().await.unwrap().is_empty());
        assert!(store.find_clones(A, 500).await.unwrap().is_empty());
        // The room itself survives.
        assert!(store.find_room("aaaaaa").await.unwrap().is_some());

        assert!(store.delete_room_connections("aaaaaa").await.unwrap().is_empty());
    }
}
