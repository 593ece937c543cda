//! SQLite storage backend implementation
//!
//! Persists the world in three tables (`events`, `facts`, `reflections`)
//! through a deadpool-sqlite connection pool. The database runs in WAL mode
//! so the HTTP read surface can query while the turn loop writes; every
//! insert and update is a single statement, so readers never observe a
//! partial record.

use crate::embeddings::{normalize, EmbeddingService};
use crate::error::{ChronicleError, Result};
use crate::storage::MemoryStore;
use crate::types::{Character, Event, EventId, Fact, FactId, Turn, WorldStats};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use deadpool_sqlite::{Config, Pool, Runtime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    turn INTEGER NOT NULL,
    character TEXT NOT NULL,
    narration TEXT NOT NULL,
    data TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS facts (
    id INTEGER PRIMARY KEY,
    character TEXT NOT NULL,
    fact TEXT NOT NULL,
    importance REAL NOT NULL,
    embedding BLOB NOT NULL,
    turn INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_facts_character ON facts(character);
CREATE TABLE IF NOT EXISTS reflections (
    character TEXT PRIMARY KEY,
    reflection TEXT NOT NULL,
    last_updated_turn INTEGER NOT NULL
);
"#;

/// Wait on a locked database before giving up with `SQLITE_BUSY`
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite storage backend
pub struct SqliteStore {
    pool: Pool,
    embeddings: Arc<dyn EmbeddingService>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `db_path` and ensure the schema
    ///
    /// # Example
    /// ```ignore
    /// let store = SqliteStore::open("world.db", embeddings).await?;
    /// ```
    pub async fn open<P: AsRef<Path>>(
        db_path: P,
        embeddings: Arc<dyn EmbeddingService>,
    ) -> Result<Self> {
        let path_str = db_path.as_ref().to_string_lossy().to_string();
        info!("Opening world database: {}", path_str);

        let pool = Config::new(path_str)
            .create_pool(Runtime::Tokio1)
            .map_err(|e| ChronicleError::Pool(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool, embeddings };
        store.init_schema().await?;

        info!("World database ready");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.interact(|conn| {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
    }

    /// Run a closure against a pooled connection
    async fn interact<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await.map_err(|e| {
            ChronicleError::Pool(format!("Failed to get connection from pool: {}", e))
        })?;

        conn.interact(move |conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            f(conn)
        })
        .await
        .map_err(|e| ChronicleError::Pool(format!("Pool interaction failed: {}", e)))?
    }

    /// Serialize f32 vector to little-endian bytes
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize little-endian bytes to f32 vector
    fn deserialize_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return Err(ChronicleError::Other(
                "Invalid embedding byte length".to_string(),
            ));
        }

        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
        let data_str: String = row.get(4)?;
        let data = serde_json::from_str(&data_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        let timestamp_str: String = row.get(5)?;
        let timestamp = parse_timestamp(&timestamp_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        Ok(Event {
            id: EventId(row.get(0)?),
            turn: row.get::<_, i64>(1)? as Turn,
            character: row.get(2)?,
            narration: row.get(3)?,
            data,
            timestamp,
        })
    }

    fn row_to_character(row: &Row<'_>) -> rusqlite::Result<Character> {
        Ok(Character {
            name: row.get(0)?,
            reflection: row.get(1)?,
            last_updated_turn: row.get::<_, i64>(2)? as Turn,
        })
    }
}

/// Event timestamps are RFC 3339. Offset-less ISO 8601 values, as written by
/// older worlds, are read as UTC.
fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .map_err(|_| rfc_err),
    }
}

#[async_trait]
impl MemoryStore for SqliteStore {
    async fn ensure_character(&self, name: &str, initial_reflection: &str) -> Result<bool> {
        let owned_name = name.to_string();
        let reflection = initial_reflection.to_string();

        let created = self
            .interact(move |conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO reflections (character, reflection, last_updated_turn)
                     VALUES (?1, ?2, 0)",
                    params![owned_name, reflection],
                )?;
                Ok(inserted > 0)
            })
            .await?;

        if created {
            info!("Created character {}", name);
        }
        Ok(created)
    }

    async fn characters(&self) -> Result<Vec<Character>> {
        self.interact(|conn| {
            let mut stmt = conn.prepare(
                "SELECT character, reflection, last_updated_turn FROM reflections ORDER BY rowid",
            )?;
            let rows = stmt.query_map([], Self::row_to_character)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn character(&self, name: &str) -> Result<Character> {
        let name = name.to_string();

        self.interact(move |conn| {
            let found = conn
                .query_row(
                    "SELECT character, reflection, last_updated_turn FROM reflections WHERE character = ?1",
                    params![name],
                    Self::row_to_character,
                )
                .optional()?;
            found.ok_or(ChronicleError::CharacterNotFound(name))
        })
        .await
    }

    async fn update_reflection(&self, name: &str, reflection: &str, turn: Turn) -> Result<()> {
        debug!("Updating reflection for {} at turn {}", name, turn);

        let name = name.to_string();
        let reflection = reflection.to_string();

        self.interact(move |conn| {
            let updated = conn.execute(
                "UPDATE reflections SET reflection = ?1, last_updated_turn = ?2 WHERE character = ?3",
                params![reflection, turn as i64, name],
            )?;
            if updated == 0 {
                return Err(ChronicleError::CharacterNotFound(name));
            }
            Ok(())
        })
        .await
    }

    async fn record_event(
        &self,
        turn: Turn,
        character: &str,
        narration: &str,
        data: &serde_json::Value,
    ) -> Result<EventId> {
        let character = character.to_string();
        let narration = narration.to_string();
        let data = serde_json::to_string(data)?;
        let timestamp = Utc::now().to_rfc3339();

        let id = self
            .interact(move |conn| {
                conn.execute(
                    "INSERT INTO events (turn, character, narration, data, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![turn as i64, character, narration, data, timestamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!("Recorded event {} for turn {}", id, turn);
        Ok(EventId(id))
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        let limit = limit as i64;

        let mut events = self
            .interact(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, turn, character, narration, data, timestamp
                     FROM events ORDER BY id DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], Self::row_to_event)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;

        events.reverse();
        Ok(events)
    }

    async fn current_turn(&self) -> Result<Turn> {
        let turn: i64 = self
            .interact(|conn| {
                Ok(conn.query_row("SELECT COALESCE(MAX(turn), 0) FROM events", [], |row| {
                    row.get(0)
                })?)
            })
            .await?;

        Ok(turn as Turn)
    }

    async fn record_fact(
        &self,
        character: &str,
        text: &str,
        importance: f32,
        turn: Turn,
    ) -> Result<FactId> {
        let mut embedding = self.embeddings.embed(text).await?;
        normalize(&mut embedding);
        let bytes = Self::serialize_embedding(&embedding);

        let character = character.to_string();
        let text = text.to_string();

        let id = self
            .interact(move |conn| {
                conn.execute(
                    "INSERT INTO facts (character, fact, importance, embedding, turn)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![character, text, f64::from(importance), bytes, turn as i64],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!("Recorded fact {} at turn {}", id, turn);
        Ok(FactId(id))
    }

    async fn facts_for(&self, character: &str) -> Result<Vec<Fact>> {
        let character = character.to_string();

        let rows = self
            .interact(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, character, fact, importance, embedding, turn
                     FROM facts WHERE character = ?1 ORDER BY id",
                )?;
                let rows = stmt.query_map(params![character], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;

        rows.into_iter()
            .map(|(id, character, text, importance, bytes, turn)| {
                Ok(Fact {
                    id: FactId(id),
                    character,
                    text,
                    importance: importance as f32,
                    embedding: Self::deserialize_embedding(&bytes)?,
                    turn: turn as Turn,
                })
            })
            .collect()
    }

    async fn event_count(&self) -> Result<usize> {
        let count: i64 = self
            .interact(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?)
            })
            .await?;

        Ok(count as usize)
    }

    async fn fact_count(&self, character: &str) -> Result<usize> {
        let character = character.to_string();

        let count: i64 = self
            .interact(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM facts WHERE character = ?1",
                    params![character],
                    |row| row.get(0),
                )?)
            })
            .await?;

        Ok(count as usize)
    }

    async fn stats(&self) -> Result<WorldStats> {
        self.interact(|conn| {
            let count = |sql: &str| -> rusqlite::Result<i64> {
                conn.query_row(sql, [], |row| row.get(0))
            };

            Ok(WorldStats {
                current_turn: count("SELECT COALESCE(MAX(turn), 0) FROM events")? as Turn,
                events: count("SELECT COUNT(*) FROM events")? as usize,
                facts: count("SELECT COUNT(*) FROM facts")? as usize,
                characters: count("SELECT COUNT(*) FROM reflections")? as usize,
            })
        })
        .await
    }
}
