//! SQLite-backed message store
//!
//! One `messages` table; the `seq` column is the insertion sequence and
//! defines the order views page through. Message ids are assigned per
//! channel inside the append transaction.
//!
//! # Performance
//! - Append: one indexed MAX lookup + one insert
//! - Page query: O(offset + length) via LIMIT/OFFSET on `seq`
//! - Index lookup: one point lookup + one indexed COUNT

use crate::store::criteria::Criteria;
use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{Direction, Message, MessageKey, NewMessage, Payload};
use crate::store::MessageStore;
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        channel_id INTEGER NOT NULL,
        message_id INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        opcode INTEGER NOT NULL,
        is_outgoing INTEGER NOT NULL,
        payload_text TEXT,
        payload_blob BLOB,
        payload_length INTEGER NOT NULL,
        UNIQUE (channel_id, message_id)
    );
    CREATE INDEX IF NOT EXISTS idx_messages_channel ON messages(channel_id, seq);
    CREATE INDEX IF NOT EXISTS idx_messages_opcode ON messages(opcode);
";

const COLUMNS: &str = "channel_id, message_id, timestamp, opcode, is_outgoing";

/// Per-channel overview, used for picking a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    pub channel_id: u32,
    pub message_count: u64,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
}

/// Raw row as read from SQLite, before range checks
struct RawRow {
    channel_id: i64,
    message_id: i64,
    timestamp: i64,
    opcode: i64,
    is_outgoing: bool,
    text: Option<String>,
    blob: Option<Vec<u8>>,
    payload_length: i64,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            channel_id: row.get(0)?,
            message_id: row.get(1)?,
            timestamp: row.get(2)?,
            opcode: row.get(3)?,
            is_outgoing: row.get(4)?,
            text: row.get(5)?,
            blob: row.get(6)?,
            payload_length: row.get(7)?,
        })
    }

    fn into_message(self) -> StoreResult<Message> {
        let corrupt = |field: &str, value: i64| {
            StoreError::Corruption(format!("{} out of range: {}", field, value))
        };

        let payload = match (self.text, self.blob) {
            (Some(text), _) => Payload::Text(text),
            (None, Some(blob)) => Payload::Binary(blob),
            (None, None) => {
                return Err(StoreError::Corruption(format!(
                    "message {}.{} has no payload",
                    self.channel_id, self.message_id
                )))
            }
        };

        Ok(Message {
            channel_id: u32::try_from(self.channel_id)
                .map_err(|_| corrupt("channel_id", self.channel_id))?,
            message_id: u32::try_from(self.message_id)
                .map_err(|_| corrupt("message_id", self.message_id))?,
            timestamp: self.timestamp,
            direction: Direction::from_outgoing(self.is_outgoing),
            opcode: u8::try_from(self.opcode).map_err(|_| corrupt("opcode", self.opcode))?,
            payload,
            payload_length: u64::try_from(self.payload_length)
                .map_err(|_| corrupt("payload_length", self.payload_length))?,
        })
    }
}

/// SQLite-backed message store
///
/// The connection sits behind a mutex so one store can be shared by the
/// producer and any number of views.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Create or open a store file
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = 10000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(path = ?path, "Opened message store");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Ephemeral store, gone when dropped
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Path of the database file, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Message counts and time bounds per channel
    pub fn channels(&self) -> StoreResult<Vec<ChannelSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT channel_id, COUNT(*), MIN(timestamp), MAX(timestamp)
             FROM messages
             GROUP BY channel_id
             ORDER BY channel_id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (channel_id, count, first, last) = row?;
            summaries.push(ChannelSummary {
                channel_id: u32::try_from(channel_id).map_err(|_| {
                    StoreError::Corruption(format!("channel_id out of range: {}", channel_id))
                })?,
                message_count: count.max(0) as u64,
                first_timestamp: first,
                last_timestamp: last,
            });
        }

        Ok(summaries)
    }
}

impl MessageStore for SqliteStore {
    fn count(&self, criteria: &Criteria) -> StoreResult<u64> {
        let (clause, values) = criteria.to_sql();
        let sql = format!("SELECT COUNT(*) FROM messages WHERE {}", clause);

        let conn = self.conn.lock();
        let count: i64 = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;

        Ok(count.max(0) as u64)
    }

    fn query(
        &self,
        criteria: &Criteria,
        offset: u64,
        length: usize,
        preview_limit: usize,
    ) -> StoreResult<Vec<Message>> {
        if length == 0 {
            return Ok(Vec::new());
        }

        let (clause, mut values) = criteria.to_sql();
        let sql = format!(
            "SELECT {}, substr(payload_text, 1, ?), substr(payload_blob, 1, ?), payload_length
             FROM messages
             WHERE {}
             ORDER BY seq
             LIMIT ? OFFSET ?",
            COLUMNS, clause
        );

        let preview = Value::Integer(preview_limit as i64);
        let mut bound = vec![preview.clone(), preview];
        bound.append(&mut values);
        bound.push(Value::Integer(length as i64));
        bound.push(Value::Integer(offset as i64));

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(bound.iter()), RawRow::read)?;

        let mut messages = Vec::with_capacity(length);
        for row in rows {
            messages.push(row?.into_message()?);
        }

        Ok(messages)
    }

    fn get(&self, key: MessageKey) -> StoreResult<Message> {
        let sql = format!(
            "SELECT {}, payload_text, payload_blob, payload_length
             FROM messages
             WHERE channel_id = ? AND message_id = ?",
            COLUMNS
        );

        let conn = self.conn.lock();
        let raw = conn
            .query_row(&sql, params![key.channel_id, key.message_id], RawRow::read)
            .optional()?
            .ok_or(StoreError::NotFound(key))?;

        raw.into_message()
    }

    fn index_of(&self, criteria: &Criteria, key: MessageKey) -> StoreResult<Option<u64>> {
        let (clause, values) = criteria.to_sql();

        let lookup = format!(
            "SELECT seq FROM messages WHERE channel_id = ? AND message_id = ? AND {}",
            clause
        );
        let mut bound = vec![
            Value::Integer(key.channel_id as i64),
            Value::Integer(key.message_id as i64),
        ];
        bound.extend(values.iter().cloned());

        let conn = self.conn.lock();
        let seq: Option<i64> = conn
            .query_row(&lookup, params_from_iter(bound.iter()), |row| row.get(0))
            .optional()?;

        let Some(seq) = seq else {
            return Ok(None);
        };

        let position = format!(
            "SELECT COUNT(*) FROM messages WHERE {} AND seq < ?",
            clause
        );
        let mut bound = values;
        bound.push(Value::Integer(seq));

        let before: i64 =
            conn.query_row(&position, params_from_iter(bound.iter()), |row| row.get(0))?;

        Ok(Some(before.max(0) as u64))
    }

    fn append(&self, message: NewMessage) -> StoreResult<Message> {
        let (text, blob) = match &message.payload {
            Payload::Text(text) => (Some(text.as_str()), None),
            Payload::Binary(bytes) => (None, Some(bytes.as_slice())),
        };

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let next_id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(message_id), 0) + 1 FROM messages WHERE channel_id = ?",
            params![message.channel_id],
            |row| row.get(0),
        )?;
        let message_id = u32::try_from(next_id).map_err(|_| {
            StoreError::Corruption(format!(
                "channel {} exhausted message ids",
                message.channel_id
            ))
        })?;

        tx.execute(
            "INSERT INTO messages
                (channel_id, message_id, timestamp, opcode, is_outgoing,
                 payload_text, payload_blob, payload_length)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                message.channel_id,
                message_id,
                message.timestamp,
                message.opcode,
                message.direction.is_outgoing(),
                text,
                blob,
                message.payload.len() as i64,
            ],
        )?;

        tx.commit()?;

        tracing::trace!(
            channel_id = message.channel_id,
            message_id,
            "Appended message"
        );

        Ok(message.into_message(message_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::opcode;
    use tempfile::tempdir;

    fn seed(store: &SqliteStore) {
        // channel 1: out TEXT, in TEXT, in PING
        // channel 2: out BINARY, in TEXT
        store
            .append(NewMessage::text(1, Direction::Outgoing, "hello"))
            .unwrap();
        store
            .append(NewMessage::binary(2, Direction::Outgoing, vec![1, 2, 3]))
            .unwrap();
        store
            .append(NewMessage::text(1, Direction::Incoming, "world"))
            .unwrap();
        store
            .append(NewMessage::text(2, Direction::Incoming, "ok"))
            .unwrap();
        store
            .append(NewMessage::text(1, Direction::Incoming, "").opcode(opcode::PING))
            .unwrap();
    }

    #[test]
    fn test_append_assigns_ids_per_channel() {
        let store = SqliteStore::in_memory().unwrap();

        let a = store.append(NewMessage::text(1, Direction::Outgoing, "a")).unwrap();
        let b = store.append(NewMessage::text(2, Direction::Outgoing, "b")).unwrap();
        let c = store.append(NewMessage::text(1, Direction::Incoming, "c")).unwrap();

        assert_eq!(a.key(), MessageKey::new(1, 1));
        assert_eq!(b.key(), MessageKey::new(2, 1));
        assert_eq!(c.key(), MessageKey::new(1, 2));
    }

    #[test]
    fn test_count_with_criteria() {
        let store = SqliteStore::in_memory().unwrap();
        seed(&store);

        assert_eq!(store.count(&Criteria::all()).unwrap(), 5);
        assert_eq!(store.count(&Criteria::all().channel(1)).unwrap(), 3);
        assert_eq!(
            store
                .count(&Criteria::all().direction(Direction::Incoming))
                .unwrap(),
            3
        );
        assert_eq!(
            store.count(&Criteria::all().opcode(opcode::TEXT)).unwrap(),
            3
        );
        assert_eq!(
            store
                .count(&Criteria::all().channel(1).opcode(opcode::PING))
                .unwrap(),
            1
        );
        assert_eq!(store.count(&Criteria::all().channel(7)).unwrap(), 0);
    }

    #[test]
    fn test_query_follows_append_order() {
        let store = SqliteStore::in_memory().unwrap();
        seed(&store);

        let rows = store.query(&Criteria::all(), 0, 10, 100).unwrap();
        let keys: Vec<_> = rows.iter().map(|m| m.key().to_string()).collect();
        assert_eq!(keys, vec!["1.1", "2.1", "1.2", "2.2", "1.3"]);

        let page = store.query(&Criteria::all(), 1, 2, 100).unwrap();
        let keys: Vec<_> = page.iter().map(|m| m.key().to_string()).collect();
        assert_eq!(keys, vec!["2.1", "1.2"]);

        assert!(store.query(&Criteria::all(), 10, 5, 100).unwrap().is_empty());
    }

    #[test]
    fn test_query_truncates_payload_preview() {
        let store = SqliteStore::in_memory().unwrap();
        let long = "x".repeat(500);
        store
            .append(NewMessage::text(1, Direction::Incoming, long.clone()))
            .unwrap();
        store
            .append(NewMessage::binary(1, Direction::Incoming, vec![7u8; 300]))
            .unwrap();

        let rows = store.query(&Criteria::all(), 0, 10, 150).unwrap();
        assert_eq!(rows[0].payload, Payload::Text("x".repeat(150)));
        assert_eq!(rows[0].payload_length, 500);
        assert!(rows[0].is_preview());
        assert_eq!(rows[1].payload.len(), 150);
        assert_eq!(rows[1].payload_length, 300);

        let full = store.get(rows[0].key()).unwrap();
        assert_eq!(full.payload, Payload::Text(long));
        assert!(!full.is_preview());
    }

    #[test]
    fn test_get_missing() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store.get(MessageKey::new(1, 1));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_index_of() {
        let store = SqliteStore::in_memory().unwrap();
        seed(&store);

        assert_eq!(
            store
                .index_of(&Criteria::all(), MessageKey::new(1, 2))
                .unwrap(),
            Some(2)
        );
        assert_eq!(
            store
                .index_of(&Criteria::all().channel(1), MessageKey::new(1, 2))
                .unwrap(),
            Some(1)
        );
        // filtered out
        assert_eq!(
            store
                .index_of(&Criteria::all().channel(2), MessageKey::new(1, 2))
                .unwrap(),
            None
        );
        // missing
        assert_eq!(
            store
                .index_of(&Criteria::all(), MessageKey::new(9, 1))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_channels_summary() {
        let store = SqliteStore::in_memory().unwrap();
        seed(&store);

        let channels = store.channels().unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].channel_id, 1);
        assert_eq!(channels[0].message_count, 3);
        assert_eq!(channels[1].message_count, 2);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db").join("messages.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            seed(&store);
        }

        {
            let store = SqliteStore::open(&path).unwrap();
            assert_eq!(store.count(&Criteria::all()).unwrap(), 5);
            assert_eq!(store.path(), Some(path.as_path()));

            let next = store
                .append(NewMessage::text(1, Direction::Outgoing, "again"))
                .unwrap();
            assert_eq!(next.message_id, 4);
        }
    }
}
