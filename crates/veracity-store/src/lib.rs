//! Veracity Storage Layer
//!
//! Implements the `FactRepository` trait on SQLite.
//!
//! # Architecture
//!
//! - `chunks`: one row per `(document_name, chunk_index)`
//! - `verified_facts` / `rejected_facts`: append-only outcome stores sharing one shape
//! - `candidates`: staged statements awaiting a verdict
//!
//! Every call runs on a single connection behind a mutex, and every dedup
//! check runs in the same transaction as the write it guards, so concurrent
//! document runs sharing one store cannot double-append.
//!
//! # Examples
//!
//! ```no_run
//! use veracity_store::SqliteStore;
//!
//! let store = SqliteStore::new("veracity.db").unwrap();
//! // Store is now ready for pipeline runs
//! ```

#![warn(missing_docs)]

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use veracity_domain::traits::FactRepository;
use veracity_domain::{
    CandidateFact, Chunk, ChunkStats, ChunkStatus, Fact, FactKey, FactStats, VerificationStatus,
};

/// How long a writer waits on a locked database file before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CHUNK_COLUMNS: &str =
    "document_name, chunk_index, content, status, contains_facts, error_message, timestamp";

const FACT_COLUMNS: &str =
    "document_name, source_chunk, statement, verification_status, verification_reason, timestamp";

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection mutex was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Lock,

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A fact referenced a chunk that is not in the store
    #[error("Chunk {chunk_index} of '{document_name}' does not exist")]
    MissingChunk {
        /// Document of the missing chunk
        document_name: String,
        /// Index of the missing chunk
        chunk_index: u32,
    },
}

/// SQLite-based implementation of `FactRepository`
///
/// # Thread Safety
///
/// The connection sits behind a mutex, so one `SqliteStore` can be shared
/// through an `Arc` by every document run in the process.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use veracity_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("veracity.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a fresh in-memory store
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Names of every document that has chunk rows, sorted
    pub fn document_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT document_name FROM chunks ORDER BY document_name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Lock)
    }

    fn fact_table(status: VerificationStatus) -> &'static str {
        match status {
            VerificationStatus::Verified => "verified_facts",
            VerificationStatus::Rejected => "rejected_facts",
        }
    }

    fn conversion_error(column: usize, e: StoreError) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    }

    fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<Chunk> {
        let status_str: String = row.get(3)?;
        let status = ChunkStatus::parse(&status_str).ok_or_else(|| {
            Self::conversion_error(
                3,
                StoreError::InvalidData(format!("Unknown chunk status: {}", status_str)),
            )
        })?;

        Ok(Chunk {
            document_name: row.get(0)?,
            chunk_index: row.get::<_, i64>(1)? as u32,
            content: row.get(2)?,
            status,
            contains_facts: row.get::<_, i64>(4)? != 0,
            error_message: row.get(5)?,
            timestamp: row.get::<_, i64>(6)? as u64,
        })
    }

    fn fact_from_row(row: &Row<'_>) -> rusqlite::Result<Fact> {
        let status_str: String = row.get(3)?;
        let verification_status = VerificationStatus::parse(&status_str).ok_or_else(|| {
            Self::conversion_error(
                3,
                StoreError::InvalidData(format!("Unknown verification status: {}", status_str)),
            )
        })?;

        Ok(Fact {
            document_name: row.get(0)?,
            source_chunk: row.get::<_, i64>(1)? as u32,
            statement: row.get(2)?,
            verification_status,
            verification_reason: row.get(4)?,
            timestamp: row.get::<_, i64>(5)? as u64,
        })
    }

    fn write_chunk(conn: &Connection, chunk: &Chunk) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO chunks (document_name, chunk_index, content, status, contains_facts, error_message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(document_name, chunk_index) DO UPDATE SET
             content = excluded.content,
             status = excluded.status,
             contains_facts = excluded.contains_facts,
             error_message = excluded.error_message,
             timestamp = excluded.timestamp",
            params![
                &chunk.document_name,
                chunk.chunk_index as i64,
                &chunk.content,
                chunk.status.as_str(),
                chunk.contains_facts as i64,
                &chunk.error_message,
                chunk.timestamp as i64,
            ],
        )?;
        Ok(())
    }

    /// Look a fact key up in both outcome stores
    fn find_fact_in(conn: &Connection, key: &FactKey) -> Result<Option<Fact>, StoreError> {
        for status in [VerificationStatus::Verified, VerificationStatus::Rejected] {
            let sql = format!(
                "SELECT {} FROM {} WHERE document_name = ?1 AND source_chunk = ?2 AND statement = ?3",
                FACT_COLUMNS,
                Self::fact_table(status)
            );
            let fact = conn
                .query_row(
                    &sql,
                    params![&key.document_name, key.source_chunk as i64, &key.statement],
                    Self::fact_from_row,
                )
                .optional()?;
            if fact.is_some() {
                return Ok(fact);
            }
        }
        Ok(None)
    }

    fn chunk_exists_in(
        conn: &Connection,
        document_name: &str,
        chunk_index: u32,
    ) -> Result<bool, StoreError> {
        let exists = conn
            .query_row(
                "SELECT 1 FROM chunks WHERE document_name = ?1 AND chunk_index = ?2",
                params![document_name, chunk_index as i64],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }

    fn count(conn: &Connection, table: &str, document_name: Option<&str>) -> Result<usize, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE (?1 IS NULL OR document_name = ?1)",
            table
        );
        let count: i64 = conn.query_row(&sql, params![document_name], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl FactRepository for SqliteStore {
    type Error = StoreError;

    fn upsert_chunk(&self, chunk: &Chunk) -> Result<(), Self::Error> {
        let conn = self.lock()?;
        Self::write_chunk(&conn, chunk)?;

        debug!(
            document = %chunk.document_name,
            chunk_index = chunk.chunk_index,
            status = %chunk.status,
            "chunk upserted"
        );
        Ok(())
    }

    fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<(), Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for chunk in chunks {
            Self::write_chunk(&tx, chunk)?;
        }
        tx.commit()?;

        debug!(chunks = chunks.len(), "chunk batch upserted");
        Ok(())
    }

    fn get_chunk(
        &self,
        document_name: &str,
        chunk_index: u32,
    ) -> Result<Option<Chunk>, Self::Error> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM chunks WHERE document_name = ?1 AND chunk_index = ?2",
            CHUNK_COLUMNS
        );
        let chunk = conn
            .query_row(
                &sql,
                params![document_name, chunk_index as i64],
                Self::chunk_from_row,
            )
            .optional()?;
        Ok(chunk)
    }

    fn list_chunks(&self, document_name: Option<&str>) -> Result<Vec<Chunk>, Self::Error> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM chunks WHERE (?1 IS NULL OR document_name = ?1)
             ORDER BY document_name, chunk_index",
            CHUNK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let chunks = stmt
            .query_map(params![document_name], Self::chunk_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    fn chunk_exists(&self, document_name: &str, chunk_index: u32) -> Result<bool, Self::Error> {
        let conn = self.lock()?;
        Self::chunk_exists_in(&conn, document_name, chunk_index)
    }

    fn delete_chunks(&self, document_name: &str) -> Result<usize, Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM chunks WHERE document_name = ?1",
            params![document_name],
        )?;
        let dropped = tx.execute(
            "DELETE FROM candidates WHERE document_name = ?1",
            params![document_name],
        )?;
        tx.commit()?;
        debug!(document = %document_name, removed, dropped, "chunks deleted");
        Ok(removed)
    }

    fn append_fact(&self, fact: &Fact) -> Result<bool, Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        // Dedup spans both outcome stores
        if Self::find_fact_in(&tx, &fact.key())?.is_some() {
            debug!(
                document = %fact.document_name,
                source_chunk = fact.source_chunk,
                "fact already recorded, skipping append"
            );
            return Ok(false);
        }

        if !Self::chunk_exists_in(&tx, &fact.document_name, fact.source_chunk)? {
            return Err(StoreError::MissingChunk {
                document_name: fact.document_name.clone(),
                chunk_index: fact.source_chunk,
            });
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            Self::fact_table(fact.verification_status),
            FACT_COLUMNS
        );
        tx.execute(
            &sql,
            params![
                &fact.document_name,
                fact.source_chunk as i64,
                &fact.statement,
                fact.verification_status.as_str(),
                &fact.verification_reason,
                fact.timestamp as i64,
            ],
        )?;
        tx.execute(
            "DELETE FROM candidates WHERE document_name = ?1 AND source_chunk = ?2 AND statement = ?3",
            params![&fact.document_name, fact.source_chunk as i64, &fact.statement],
        )?;
        tx.commit()?;

        Ok(true)
    }

    fn fact_exists(
        &self,
        document_name: &str,
        source_chunk: u32,
        statement: &str,
    ) -> Result<bool, Self::Error> {
        let key = FactKey {
            document_name: document_name.to_string(),
            source_chunk,
            statement: statement.to_string(),
        };
        Ok(self.find_fact(&key)?.is_some())
    }

    fn find_fact(&self, key: &FactKey) -> Result<Option<Fact>, Self::Error> {
        let conn = self.lock()?;
        Self::find_fact_in(&conn, key)
    }

    fn list_facts(
        &self,
        document_name: Option<&str>,
        status: VerificationStatus,
    ) -> Result<Vec<Fact>, Self::Error> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE (?1 IS NULL OR document_name = ?1)
             ORDER BY document_name, source_chunk, timestamp",
            FACT_COLUMNS,
            Self::fact_table(status)
        );
        let mut stmt = conn.prepare(&sql)?;
        let facts = stmt
            .query_map(params![document_name], Self::fact_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(facts)
    }

    fn stage_candidate(&self, candidate: &CandidateFact) -> Result<bool, Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if Self::find_fact_in(&tx, &candidate.key())?.is_some() {
            return Ok(false);
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO candidates (document_name, source_chunk, statement, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &candidate.document_name,
                candidate.source_chunk as i64,
                &candidate.statement,
                veracity_domain::current_timestamp() as i64,
            ],
        )?;
        tx.commit()?;

        Ok(inserted == 1)
    }

    fn pending_candidates(
        &self,
        document_name: Option<&str>,
    ) -> Result<Vec<CandidateFact>, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT document_name, source_chunk, statement FROM candidates
             WHERE (?1 IS NULL OR document_name = ?1)
             ORDER BY document_name, source_chunk, seq",
        )?;
        let candidates = stmt
            .query_map(params![document_name], |row| {
                Ok(CandidateFact {
                    document_name: row.get(0)?,
                    source_chunk: row.get::<_, i64>(1)? as u32,
                    statement: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(candidates)
    }

    fn get_stats(&self, document_name: Option<&str>) -> Result<FactStats, Self::Error> {
        let conn = self.lock()?;
        let verified = Self::count(&conn, "verified_facts", document_name)?;
        let rejected = Self::count(&conn, "rejected_facts", document_name)?;
        let pending = Self::count(&conn, "candidates", document_name)?;
        Ok(FactStats::new(verified, rejected, pending))
    }

    fn chunk_stats(&self, document_name: Option<&str>) -> Result<ChunkStats, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM chunks
             WHERE (?1 IS NULL OR document_name = ?1)
             GROUP BY status",
        )?;
        let rows = stmt
            .query_map(params![document_name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stats = ChunkStats::default();
        for (status, count) in rows {
            match ChunkStatus::parse(&status) {
                Some(ChunkStatus::Pending) => stats.pending += count,
                Some(ChunkStatus::Processing) => stats.processing += count,
                Some(ChunkStatus::Processed) => stats.processed += count,
                Some(ChunkStatus::Failed) => stats.failed += count,
                None => {
                    return Err(StoreError::InvalidData(format!(
                        "Unknown chunk status: {}",
                        status
                    )))
                }
            }
            stats.total += count;
        }
        Ok(stats)
    }
}
