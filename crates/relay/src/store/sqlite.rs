use std::str::FromStr;

use {
    async_trait::async_trait,
    crossover_common::{Endpoint, MessageId, types::now_ms},
    sqlx::{
        Sqlite, SqlitePool, Transaction,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::{debug, info},
};

use crate::{
    error::{Error, Result},
    model::{Connection, MappedClone, MessageMapping, Room},
    store::TopologyStore,
};

// Snowflakes fit in 63 bits, so they are stored as SQLite INTEGERs.
fn to_db(id: u64) -> i64 {
    id as i64
}

fn from_db(id: i64) -> u64 {
    id as u64
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: String,
    origin_guild_id: i64,
    origin_channel_id: i64,
    created_at: i64,
}

impl From<RoomRow> for Room {
    fn from(r: RoomRow) -> Self {
        Self {
            id: r.id,
            origin: Endpoint::new(from_db(r.origin_guild_id), from_db(r.origin_channel_id)),
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConnectionRow {
    id: i64,
    room_id: String,
    source_guild_id: i64,
    source_channel_id: i64,
    target_guild_id: i64,
    target_channel_id: i64,
}

impl From<ConnectionRow> for Connection {
    fn from(r: ConnectionRow) -> Self {
        Self {
            id: r.id,
            room_id: r.room_id,
            source: Endpoint::new(from_db(r.source_guild_id), from_db(r.source_channel_id)),
            target: Endpoint::new(from_db(r.target_guild_id), from_db(r.target_channel_id)),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CloneRow {
    id: i64,
    room_id: String,
    source_guild_id: i64,
    source_channel_id: i64,
    target_guild_id: i64,
    target_channel_id: i64,
    cloned_message_id: i64,
}

impl From<CloneRow> for MappedClone {
    fn from(r: CloneRow) -> Self {
        Self {
            cloned_message_id: from_db(r.cloned_message_id),
            connection: Connection {
                id: r.id,
                room_id: r.room_id,
                source: Endpoint::new(from_db(r.source_guild_id), from_db(r.source_channel_id)),
                target: Endpoint::new(from_db(r.target_guild_id), from_db(r.target_channel_id)),
            },
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// SQLite-backed topology store.
#[derive(Clone)]
pub struct SqliteTopologyStore {
    pool: SqlitePool,
}

impl SqliteTopologyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url` with foreign keys enforced. The database file is
    /// created if missing.
    ///
    /// `sqlite::memory:` URLs give every pooled connection its own database;
    /// use `max_connections = 1` for those.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        info!(max_connections, "topology store connected");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection. The store is unusable afterwards.
    pub async fn close(&self) {
        info!("closing topology store");
        self.pool.close().await;
    }

    async fn insert_connection(
        tx: &mut Transaction<'_, Sqlite>,
        room_id: &str,
        source: Endpoint,
        target: Endpoint,
        now: i64,
    ) -> Result<Connection> {
        let result = sqlx::query(
            "INSERT INTO connections
             (room_id, source_guild_id, source_channel_id, target_guild_id, target_channel_id,
              created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(room_id)
        .bind(to_db(source.guild_id))
        .bind(to_db(source.channel_id))
        .bind(to_db(target.guild_id))
        .bind(to_db(target.channel_id))
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::AlreadyConnected {
                    this: source,
                    that: target,
                }
            } else {
                e.into()
            }
        })?;

        Ok(Connection {
            id: result.last_insert_rowid(),
            room_id: room_id.to_string(),
            source,
            target,
        })
    }
}

#[async_trait]
impl TopologyStore for SqliteTopologyStore {
    async fn upsert_room(&self, origin: Endpoint, code: &str) -> Result<Room> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, RoomRow>(
            "SELECT id, origin_guild_id, origin_channel_id, created_at FROM rooms
             WHERE origin_guild_id = ? AND origin_channel_id = ?",
        )
        .bind(to_db(origin.guild_id))
        .bind(to_db(origin.channel_id))
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = existing {
            tx.commit().await?;
            return Ok(row.into());
        }

        let taken = sqlx::query_scalar::<_, i64>("SELECT 1 FROM rooms WHERE id = ?")
            .bind(code)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if taken {
            return Err(Error::RoomCodeTaken {
                code: code.to_string(),
            });
        }

        let now = now_ms();
        sqlx::query(
            "INSERT INTO rooms (id, origin_guild_id, origin_channel_id, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(code)
        .bind(to_db(origin.guild_id))
        .bind(to_db(origin.channel_id))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::RoomCodeTaken {
                    code: code.to_string(),
                }
            } else {
                e.into()
            }
        })?;
        tx.commit().await?;

        debug!(room = code, origin = %origin, "room created");
        Ok(Room {
            id: code.to_string(),
            origin,
            created_at: now,
        })
    }

    async fn find_room(&self, code: &str) -> Result<Option<Room>> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, origin_guild_id, origin_channel_id, created_at FROM rooms WHERE id = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_connection(&self, source: Endpoint, room_id: &str) -> Result<Option<Connection>> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            "SELECT id, room_id, source_guild_id, source_channel_id, target_guild_id,
                    target_channel_id
             FROM connections
             WHERE room_id = ? AND source_guild_id = ? AND source_channel_id = ?
             ORDER BY id
             LIMIT 1",
        )
        .bind(room_id)
        .bind(to_db(source.guild_id))
        .bind(to_db(source.channel_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn connection_exists(&self, source: Endpoint, target: Endpoint) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM connections
             WHERE source_guild_id = ? AND source_channel_id = ?
               AND target_guild_id = ? AND target_channel_id = ?",
        )
        .bind(to_db(source.guild_id))
        .bind(to_db(source.channel_id))
        .bind(to_db(target.guild_id))
        .bind(to_db(target.channel_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
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

        let now = now_ms();
        let mut tx = self.pool.begin().await?;
        let forward = Self::insert_connection(&mut tx, room_id, a, b, now).await?;
        let backward = Self::insert_connection(&mut tx, room_id, b, a, now).await?;
        tx.commit().await?;

        debug!(room = room_id, a = %a, b = %b, "connection pair inserted");
        Ok((forward, backward))
    }

    async fn delete_room_connections(&self, room_id: &str) -> Result<Vec<Connection>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, ConnectionRow>(
            "SELECT id, room_id, source_guild_id, source_channel_id, target_guild_id,
                    target_channel_id
             FROM connections WHERE room_id = ? ORDER BY id",
        )
        .bind(room_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM message_mappings
             WHERE connection_id IN (SELECT id FROM connections WHERE room_id = ?)",
        )
        .bind(room_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM connections WHERE room_id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(room = room_id, removed = rows.len(), "room connections deleted");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn connections_from(&self, source: Endpoint) -> Result<Vec<Connection>> {
        let rows = sqlx::query_as::<_, ConnectionRow>(
            "SELECT id, room_id, source_guild_id, source_channel_id, target_guild_id,
                    target_channel_id
             FROM connections
             WHERE source_guild_id = ? AND source_channel_id = ?
             ORDER BY id",
        )
        .bind(to_db(source.guild_id))
        .bind(to_db(source.channel_id))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn has_connections_from(&self, source: Endpoint) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM connections
             WHERE source_guild_id = ? AND source_channel_id = ?
             LIMIT 1",
        )
        .bind(to_db(source.guild_id))
        .bind(to_db(source.channel_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn connected_sources(&self) -> Result<Vec<Endpoint>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "SELECT DISTINCT source_guild_id, source_channel_id FROM connections
             ORDER BY source_guild_id, source_channel_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(g, c)| Endpoint::new(from_db(g), from_db(c)))
            .collect())
    }

    async fn room_links(&self, source: Endpoint) -> Result<Vec<Connection>> {
        let rows = sqlx::query_as::<_, ConnectionRow>(
            "SELECT id, room_id, source_guild_id, source_channel_id, target_guild_id,
                    target_channel_id
             FROM connections
             WHERE id IN (
                 SELECT MIN(id) FROM connections
                 WHERE source_guild_id = ? AND source_channel_id = ?
                 GROUP BY room_id
             )
             ORDER BY id",
        )
        .bind(to_db(source.guild_id))
        .bind(to_db(source.channel_id))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_mapping(&self, mapping: &MessageMapping) -> Result<()> {
        sqlx::query(
            "INSERT INTO message_mappings
             (connection_id, origin_message_id, cloned_message_id, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(mapping.connection_id)
        .bind(to_db(mapping.origin_message_id))
        .bind(to_db(mapping.cloned_message_id))
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_clones(
        &self,
        source: Endpoint,
        origin_message_id: MessageId,
    ) -> Result<Vec<MappedClone>> {
        let rows = sqlx::query_as::<_, CloneRow>(
            "SELECT c.id, c.room_id, c.source_guild_id, c.source_channel_id,
                    c.target_guild_id, c.target_channel_id, m.cloned_message_id
             FROM message_mappings m
             JOIN connections c ON c.id = m.connection_id
             WHERE c.source_guild_id = ? AND c.source_channel_id = ?
               AND m.origin_message_id = ?
             ORDER BY m.id",
        )
        .bind(to_db(source.guild_id))
        .bind(to_db(source.channel_id))
        .bind(to_db(origin_message_id))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteTopologyStore {
        let store = SqliteTopologyStore::connect("sqlite::memory:", 1)
            .await
            .unwrap();
        crate::run_migrations(store.pool()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn conformance() {
        let store = test_store().await;
        crate::store::conformance::run_all(&store).await;
    }

    #[tokio::test]
    async fn large_snowflakes_roundtrip() {
        let store = test_store().await;
        let a = Endpoint::new(1_234_567_890_123_456_789, 987_654_321_098_765_432);
        let b = Endpoint::new(1_111_111_111_111_111_111, 2_222_222_222_222_222_222);
        store.upsert_room(a, "big001").await.unwrap();
        store.insert_connection_pair("big001", b, a).await.unwrap();

        let links = store.connections_from(a).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, b);
        assert_eq!(store.connected_sources().await.unwrap(), vec![b, a]);
    }

    #[tokio::test]
    async fn mappings_follow_their_connections() {
        let store = test_store().await;
        let a = Endpoint::new(1, 10);
        let b = Endpoint::new(2, 20);
        store.upsert_room(a, "room01").await.unwrap();
        let (ab, _) = store.insert_connection_pair("room01", b, a).await.unwrap();
        store
            .insert_mapping(&MessageMapping {
                connection_id: ab.id,
                origin_message_id: 100,
                cloned_message_id: 200,
            })
            .await
            .unwrap();

        store.delete_room_connections("room01").await.unwrap();

        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message_mappings")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = test_store().await;
        crate::run_migrations(store.pool()).await.unwrap();
    }
}
