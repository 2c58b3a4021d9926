//! Exchange storage using SQLite + USearch
//!
//! SQLite stores the source of truth (exchange records and model
//! metadata). USearch provides k-NN search over exchange embeddings via
//! an HNSW index, keyed by SQLite rowid. Two files live side by side:
//! `exchanges.db` and `exchanges.usearch`.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use super::types::{DateRange, Exchange, ToolCall};

/// A vector query hit: exchange plus its raw cosine distance
///
/// Distances come straight from USearch (0 = identical, larger = less
/// similar); callers map them to similarities.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub exchange: Exchange,
    pub distance: f32,
}

/// USearch has no predicate pushdown, so date-filtered vector queries
/// over-fetch by this factor and filter on hydration.
const DATE_FILTER_OVERFETCH: usize = 4;

/// Dual storage for exchanges: SQLite + USearch
pub struct ExchangeStore {
    vectors: Index,
    db: Connection,
    index_path: PathBuf,
    dimensions: usize,
}

impl ExchangeStore {
    /// Open or create exchange storage at the given directory
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        let base = path.as_ref();
        std::fs::create_dir_all(base)?;

        let db_path = base.join("exchanges.db");
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        Self::init_schema(&db)?;

        let options = IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            ..Default::default()
        };

        let index = Index::new(&options).context("Failed to create USearch index")?;
        index.reserve(1024)?;

        let index_path = base.join("exchanges.usearch");
        if index_path.exists() {
            index
                .load(index_path.to_str().context("Non-UTF8 index path")?)
                .context("Failed to load existing USearch index")?;
        }

        Ok(Self {
            vectors: index,
            db,
            index_path,
            dimensions,
        })
    }

    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS exchanges (
                rowid INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                project TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                user_message TEXT NOT NULL,
                assistant_message TEXT NOT NULL,
                archive_path TEXT NOT NULL,
                line_start INTEGER NOT NULL,
                line_end INTEGER NOT NULL,
                tool_calls TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_exchanges_timestamp ON exchanges (timestamp);
            CREATE TABLE IF NOT EXISTS model_metadata (
                model_name TEXT NOT NULL,
                dimensions INTEGER NOT NULL,
                recorded_at TEXT NOT NULL
            );",
        )?;

        Ok(())
    }

    /// Insert an exchange into both SQLite and USearch
    ///
    /// Exchanges are immutable - duplicate ids result in an error.
    pub fn insert(&mut self, exchange: &Exchange, embedding: &[f32]) -> Result<()> {
        if exchange.line_start > exchange.line_end {
            bail!(
                "Invalid line range for exchange {}: {} > {}",
                exchange.id,
                exchange.line_start,
                exchange.line_end
            );
        }
        if embedding.len() != self.dimensions {
            bail!(
                "Embedding dimension mismatch for exchange {}: expected {}, got {}",
                exchange.id,
                self.dimensions,
                embedding.len()
            );
        }

        let tool_calls_json = if exchange.tool_calls.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&exchange.tool_calls)?)
        };

        // Insert into SQLite (source of truth) and get rowid atomically
        let rowid: i64 = self.db.query_row(
            "INSERT INTO exchanges (id, project, timestamp, user_message,
                                    assistant_message, archive_path, line_start, line_end, tool_calls)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             RETURNING rowid",
            params![
                &exchange.id,
                &exchange.project,
                &exchange.timestamp,
                &exchange.user_message,
                &exchange.assistant_message,
                &exchange.archive_path,
                exchange.line_start,
                exchange.line_end,
                tool_calls_json,
            ],
            |row| row.get(0),
        )?;

        // HNSW index needs headroom before adding
        if self.vectors.size() + 1 > self.vectors.capacity() {
            self.vectors.reserve(self.vectors.capacity() * 2)?;
        }

        self.vectors
            .add(rowid as u64, embedding)
            .context("Failed to add vector to USearch index")?;

        Ok(())
    }

    /// k-nearest-neighbor query, ordered ascending by cosine distance
    ///
    /// With a date range, over-fetches from the index and filters on
    /// hydration since USearch cannot filter by predicate itself.
    pub fn vector_query(
        &self,
        query_vector: &[f32],
        k: usize,
        range: &DateRange,
    ) -> Result<Vec<VectorHit>> {
        let fetch = if range.is_unbounded() {
            k
        } else {
            k * DATE_FILTER_OVERFETCH
        };

        let matches = self
            .vectors
            .search(query_vector, fetch)
            .context("Failed to search USearch index")?;

        // Hydrate from SQLite, preserving USearch's ascending-distance order
        let mut hits = Vec::new();
        for (rowid, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            if let Some(exchange) = self.load_by_rowid(*rowid as i64)? {
                if range.contains(&exchange.timestamp) {
                    hits.push(VectorHit {
                        exchange,
                        distance: *distance,
                    });
                    if hits.len() >= k {
                        break;
                    }
                }
            }
        }

        Ok(hits)
    }

    /// Case-insensitive substring scan over both message fields
    ///
    /// Matches exchanges where the needle occurs in `user_message` OR
    /// `assistant_message`, within the date range, newest first.
    pub fn text_scan(
        &self,
        needle: &str,
        range: &DateRange,
        limit: usize,
    ) -> Result<Vec<Exchange>> {
        let mut stmt = self.db.prepare(
            "SELECT id, project, timestamp, user_message, assistant_message,
                    archive_path, line_start, line_end, tool_calls
             FROM exchanges
             WHERE (instr(lower(user_message), lower(?1)) > 0
                    OR instr(lower(assistant_message), lower(?1)) > 0)
               AND (?2 IS NULL OR timestamp >= ?2)
               AND (?3 IS NULL OR timestamp <= ?3)
             ORDER BY timestamp DESC
             LIMIT ?4",
        )?;

        let exchanges = stmt
            .query_map(
                params![needle, range.after, range.before, limit],
                Self::exchange_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect text scan results")?;

        Ok(exchanges)
    }

    fn exchange_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Exchange> {
        let tool_calls_json: Option<String> = row.get(8)?;
        let tool_calls: Vec<ToolCall> = tool_calls_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();

        Ok(Exchange {
            id: row.get(0)?,
            project: row.get(1)?,
            timestamp: row.get(2)?,
            user_message: row.get(3)?,
            assistant_message: row.get(4)?,
            archive_path: row.get(5)?,
            line_start: row.get(6)?,
            line_end: row.get(7)?,
            tool_calls,
        })
    }

    fn load_by_rowid(&self, rowid: i64) -> Result<Option<Exchange>> {
        let result = self.db.query_row(
            "SELECT id, project, timestamp, user_message, assistant_message,
                    archive_path, line_start, line_end, tool_calls
             FROM exchanges WHERE rowid = ?1",
            params![rowid],
            Self::exchange_from_row,
        );

        match result {
            Ok(exchange) => Ok(Some(exchange)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Save USearch index to disk
    pub fn save_index(&self) -> Result<()> {
        self.vectors
            .save(self.index_path.to_str().context("Non-UTF8 index path")?)
            .context("Failed to save USearch index")?;
        Ok(())
    }

    /// Record which embedding model produced the stored vectors
    pub fn record_model(&self, model_name: &str, dimensions: usize) -> Result<()> {
        self.db.execute(
            "INSERT INTO model_metadata (model_name, dimensions, recorded_at)
             VALUES (?1, ?2, ?3)",
            params![
                model_name,
                dimensions as i64,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Most recently recorded embedding model, if any
    pub fn stored_model(&self) -> Result<Option<(String, usize)>> {
        let row = self
            .db
            .query_row(
                "SELECT model_name, dimensions FROM model_metadata
                 ORDER BY recorded_at DESC LIMIT 1",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)),
            )
            .optional()?;

        Ok(row)
    }

    /// Count of stored exchanges
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM exchanges", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count of distinct source archives
    pub fn archive_count(&self) -> Result<usize> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(DISTINCT archive_path) FROM exchanges",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Count of distinct projects
    pub fn project_count(&self) -> Result<usize> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(DISTINCT project) FROM exchanges",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
