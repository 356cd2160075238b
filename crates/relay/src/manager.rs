//! Room and connection lifecycle.
//!
//! The manager owns every topology mutation and keeps the membership cache
//! in step with the changes it makes.

use std::{collections::BTreeSet, sync::Arc};

use {
    crossover_common::Endpoint,
    tracing::{debug, info, warn},
};

use crate::{
    cache::MembershipCache,
    code::{self, RandomRoomCodes, RoomCodeGenerator},
    error::{Error, Result},
    model::{Connection, Room, RoomLink},
    store::TopologyStore,
};

/// Attempts at finding an unused room code before giving up.
const MAX_CODE_ATTEMPTS: usize = 8;

/// A freshly established link, returned so the caller can notify the remote
/// side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linked {
    pub room_id: String,
    /// The endpoint that asked to connect.
    pub this: Endpoint,
    /// The room's origin.
    pub that: Endpoint,
}

/// Result of tearing down a room's links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlinked {
    pub room_id: String,
    pub this: Endpoint,
    pub that: Endpoint,
    /// Every connection row that was deleted, both directions.
    pub removed: Vec<Connection>,
    /// Endpoints whose cache entry was cleared because nothing else links
    /// them.
    pub cleared: Vec<Endpoint>,
}

pub struct RoomManager {
    store: Arc<dyn TopologyStore>,
    cache: Arc<MembershipCache>,
    codes: Box<dyn RoomCodeGenerator>,
}

impl RoomManager {
    pub fn new(store: Arc<dyn TopologyStore>, cache: Arc<MembershipCache>) -> Self {
        Self {
            store,
            cache,
            codes: Box::new(RandomRoomCodes),
        }
    }

    #[must_use]
    pub fn with_code_generator(mut self, codes: impl RoomCodeGenerator + 'static) -> Self {
        self.codes = Box::new(codes);
        self
    }

    pub fn cache(&self) -> &Arc<MembershipCache> {
        &self.cache
    }

    /// Return the endpoint's room, creating it on first use.
    pub async fn open_room(&self, endpoint: Endpoint) -> Result<Room> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let candidate = self.codes.generate();
            match self.store.upsert_room(endpoint, &candidate).await {
                Ok(room) => {
                    debug!(room = %room.id, endpoint = %endpoint, "room opened");
                    return Ok(room);
                },
                Err(Error::RoomCodeTaken { code }) => {
                    debug!(code, attempt, "room code collision, retrying");
                },
                Err(e) => return Err(e),
            }
        }
        Err(Error::store(format!(
            "no free room code after {MAX_CODE_ATTEMPTS} attempts"
        )))
    }

    /// Link `requesting` with the origin of room `room_code`.
    pub async fn connect(&self, room_code: &str, requesting: Endpoint) -> Result<Linked> {
        let code = code::normalize(room_code);
        let room = self
            .store
            .find_room(&code)
            .await?
            .ok_or_else(|| Error::room_not_found(&code))?;
        let that = room.origin;

        if requesting == that {
            return Err(Error::SelfConnection {
                endpoint: requesting,
            });
        }
        if self.is_connected(requesting, that).await? {
            return Err(Error::AlreadyConnected {
                this: requesting,
                that,
            });
        }

        self.store
            .insert_connection_pair(&room.id, requesting, that)
            .await?;

        self.cache.mark(requesting);
        self.cache.mark(that);

        info!(room = %room.id, this = %requesting, that = %that, "endpoints linked");
        Ok(Linked {
            room_id: room.id,
            this: requesting,
            that,
        })
    }

    /// Remove every link of room `room_code`, as seen from `requesting`.
    ///
    /// The whole room is torn down, including links other endpoints made to
    /// the same origin.
    pub async fn disconnect(&self, room_code: &str, requesting: Endpoint) -> Result<Unlinked> {
        let code = code::normalize(room_code);
        let conn = self
            .store
            .find_connection(requesting, &code)
            .await?
            .ok_or_else(|| Error::room_not_found(&code))?;
        let that = conn.target;

        if !self.is_connected(requesting, that).await? {
            return Err(Error::NotConnected {
                code,
                endpoint: requesting,
            });
        }

        let removed = self.store.delete_room_connections(&conn.room_id).await?;

        let affected: BTreeSet<Endpoint> = removed
            .iter()
            .flat_map(|c| [c.source, c.target])
            .chain([requesting, that])
            .collect();
        let mut cleared = Vec::new();
        for endpoint in affected {
            match self.store.has_connections_from(endpoint).await {
                Ok(true) => {
                    debug!(endpoint = %endpoint, "endpoint still linked elsewhere");
                },
                Ok(false) => {
                    self.cache.clear(endpoint);
                    cleared.push(endpoint);
                },
                Err(e) => {
                    // Leave the entry: a stale hit costs one store lookup, a
                    // stale miss would drop messages.
                    warn!(endpoint = %endpoint, error = %e, "could not re-check endpoint links");
                },
            }
        }

        info!(
            room = %conn.room_id,
            this = %requesting,
            that = %that,
            removed = removed.len(),
            "room links removed"
        );
        Ok(Unlinked {
            room_id: conn.room_id,
            this: requesting,
            that,
            removed,
            cleared,
        })
    }

    /// One entry per distinct room the endpoint participates in.
    pub async fn list_connections(&self, endpoint: Endpoint) -> Result<Vec<RoomLink>> {
        let links = self.store.room_links(endpoint).await?;
        Ok(links.into_iter().map(RoomLink::from).collect())
    }

    /// Both directional rows exist.
    pub async fn is_connected(&self, a: Endpoint, b: Endpoint) -> Result<bool> {
        Ok(self.store.connection_exists(a, b).await? && self.store.connection_exists(b, a).await?)
    }

    /// Mark every endpoint that has persisted connections. Returns how many
    /// were marked.
    pub async fn warm_cache(&self) -> Result<usize> {
        let sources = self.store.connected_sources().await?;
        for endpoint in &sources {
            self.cache.mark(*endpoint);
        }
        info!(endpoints = sources.len(), "membership cache warmed");
        Ok(sources.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::store::InMemoryTopologyStore,
        std::{collections::VecDeque, sync::Mutex},
    };

    const A: Endpoint = Endpoint::new(1, 10);
    const B: Endpoint = Endpoint::new(2, 20);
    const C: Endpoint = Endpoint::new(3, 30);

    /// Hands out a fixed sequence of codes.
    struct ScriptedCodes(Mutex<VecDeque<&'static str>>);

    impl ScriptedCodes {
        fn new(codes: &[&'static str]) -> Self {
            Self(Mutex::new(codes.iter().copied().collect()))
        }
    }

    impl RoomCodeGenerator for ScriptedCodes {
        fn generate(&self) -> String {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or("zzzzzz")
                .to_string()
        }
    }

    fn manager(codes: &[&'static str]) -> (RoomManager, Arc<InMemoryTopologyStore>) {
        let store = Arc::new(InMemoryTopologyStore::new());
        let cache = Arc::new(MembershipCache::new());
        let mgr = RoomManager::new(store.clone(), cache).with_code_generator(ScriptedCodes::new(codes));
        (mgr, store)
    }

    #[tokio::test]
    async fn open_room_is_idempotent() {
        let (mgr, _) = manager(&["abcd12", "other1"]);
        let first = mgr.open_room(A).await.unwrap();
        let second = mgr.open_room(A).await.unwrap();
        assert_eq!(first.id, "abcd12");
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn open_room_retries_on_collision() {
        let (mgr, _) = manager(&["abcd12", "abcd12", "efgh34"]);
        assert_eq!(mgr.open_room(A).await.unwrap().id, "abcd12");
        assert_eq!(mgr.open_room(B).await.unwrap().id, "efgh34");
    }

    #[tokio::test]
    async fn open_room_gives_up_eventually() {
        let (mgr, _) = manager(&["abcd12"]);
        mgr.open_room(A).await.unwrap();
        // Every later code is the default "zzzzzz"; take it, then exhaust.
        mgr.open_room(B).await.unwrap();
        let err = mgr.open_room(C).await.unwrap_err();
        assert!(matches!(err, Error::Store { .. }));
    }

    #[tokio::test]
    async fn connect_creates_pair_and_marks_cache() {
        let (mgr, store) = manager(&["abcd12"]);
        let room = mgr.open_room(A).await.unwrap();

        let linked = mgr.connect(&room.id, B).await.unwrap();
        assert_eq!(linked.this, B);
        assert_eq!(linked.that, A);
        assert!(mgr.is_connected(A, B).await.unwrap());
        assert!(mgr.cache().has(A));
        assert!(mgr.cache().has(B));

        let from_a = store.connections_from(A).await.unwrap();
        let from_b = store.connections_from(B).await.unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_b.len(), 1);
        assert_eq!(from_a[0].room_id, from_b[0].room_id);
    }

    #[tokio::test]
    async fn connect_accepts_pasted_code() {
        let (mgr, _) = manager(&["abcd12"]);
        mgr.open_room(A).await.unwrap();
        assert!(mgr.connect(" `ABCD12` ", B).await.is_ok());
    }

    #[tokio::test]
    async fn connect_unknown_room() {
        let (mgr, _) = manager(&[]);
        let err = mgr.connect("nope00", B).await.unwrap_err();
        assert!(matches!(err, Error::RoomNotFound { code } if code == "nope00"));
    }

    #[tokio::test]
    async fn connect_to_self_rejected() {
        let (mgr, store) = manager(&["abcd12"]);
        mgr.open_room(A).await.unwrap();
        let err = mgr.connect("abcd12", A).await.unwrap_err();
        assert!(matches!(err, Error::SelfConnection { .. }));
        assert!(store.connected_sources().await.unwrap().is_empty());
        assert!(!mgr.cache().has(A));
    }

    #[tokio::test]
    async fn connect_twice_rejected() {
        let (mgr, store) = manager(&["abcd12"]);
        mgr.open_room(A).await.unwrap();
        mgr.connect("abcd12", B).await.unwrap();

        let err = mgr.connect("abcd12", B).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyConnected { .. }));
        assert_eq!(store.connections_from(A).await.unwrap().len(), 1);
        assert_eq!(store.connections_from(B).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_unknown_room() {
        let (mgr, _) = manager(&["abcd12"]);
        mgr.open_room(A).await.unwrap();
        let err = mgr.disconnect("abcd12", B).await.unwrap_err();
        assert!(matches!(err, Error::RoomNotFound { .. }));
    }

    #[tokio::test]
    async fn disconnect_tears_down_whole_room() {
        let (mgr, store) = manager(&["abcd12"]);
        mgr.open_room(A).await.unwrap();
        mgr.connect("abcd12", B).await.unwrap();
        mgr.connect("abcd12", C).await.unwrap();

        let unlinked = mgr.disconnect("abcd12", B).await.unwrap();
        assert_eq!(unlinked.that, A);
        assert_eq!(unlinked.removed.len(), 4);
        assert!(!mgr.is_connected(A, C).await.unwrap());
        assert!(store.connected_sources().await.unwrap().is_empty());
        for ep in [A, B, C] {
            assert!(!mgr.cache().has(ep), "{ep} should be cleared");
        }
    }

    #[tokio::test]
    async fn disconnect_keeps_cache_for_endpoints_linked_elsewhere() {
        let (mgr, _) = manager(&["abcd12", "efgh34"]);
        mgr.open_room(A).await.unwrap();
        mgr.open_room(C).await.unwrap();
        mgr.connect("abcd12", B).await.unwrap();
        mgr.connect("efgh34", A).await.unwrap();

        let unlinked = mgr.disconnect("abcd12", B).await.unwrap();
        assert_eq!(unlinked.cleared, vec![B]);
        assert!(!mgr.cache().has(B));
        // A is still linked with C through the other room.
        assert!(mgr.cache().has(A));
        assert!(mgr.is_connected(A, C).await.unwrap());
    }

    #[tokio::test]
    async fn list_dedupes_by_room() {
        let (mgr, _) = manager(&["abcd12", "efgh34"]);
        mgr.open_room(A).await.unwrap();
        mgr.open_room(C).await.unwrap();
        mgr.connect("abcd12", B).await.unwrap();
        mgr.connect("abcd12", C).await.unwrap();

        let links = mgr.list_connections(A).await.unwrap();
        assert_eq!(links, vec![RoomLink {
            room_id: "abcd12".into(),
            target: B,
        }]);
        assert!(mgr.list_connections(Endpoint::new(9, 9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn warm_cache_marks_sources() {
        let (mgr, store) = manager(&["abcd12"]);
        mgr.open_room(A).await.unwrap();
        mgr.connect("abcd12", B).await.unwrap();

        // A fresh process sees the same store with an empty cache.
        let fresh = RoomManager::new(store, Arc::new(MembershipCache::new()));
        assert!(!fresh.cache().has(A));
        assert_eq!(fresh.warm_cache().await.unwrap(), 2);
        assert!(fresh.cache().has(A));
        assert!(fresh.cache().has(B));
    }
}
