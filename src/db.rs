use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;

use crate::table::{ClusterSummary, ResultRow};

/// SQLite image of one pipeline state.
pub struct StateDb {
    conn: Connection,
}

impl StateDb {
    /// Create a new in-memory database
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an existing database file
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .context(format!("Failed to open database at {}", path.display()))?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS rows (
                    idx INTEGER PRIMARY KEY,
                    external_id TEXT,
                    text TEXT NOT NULL,
                    cluster INTEGER NOT NULL,
                    keywords TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS embeddings (
                    idx INTEGER PRIMARY KEY,
                    vector BLOB NOT NULL
                );

                CREATE TABLE IF NOT EXISTS reduced (
                    idx INTEGER PRIMARY KEY,
                    vector BLOB NOT NULL
                );

                CREATE TABLE IF NOT EXISTS summaries (
                    cluster INTEGER PRIMARY KEY,
                    keywords TEXT NOT NULL
                );
                "#,
            )
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    pub fn insert_rows(&mut self, rows: &[ResultRow]) -> Result<()> {
        let tx = self.conn.transaction().context("Failed to begin transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO rows (idx, external_id, text, cluster, keywords) VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .context("Failed to prepare statement")?;
            for (idx, row) in rows.iter().enumerate() {
                stmt.execute(params![
                    idx as i64,
                    row.external_id,
                    row.text,
                    row.cluster,
                    row.keywords
                ])
                .context(format!("Failed to insert row {idx}"))?;
            }
        }
        tx.commit().context("Failed to commit rows")?;
        Ok(())
    }

    /// Store vectors as little-endian `f32` blobs in `table`.
    pub fn insert_vectors(&mut self, table: VectorTable, vectors: &[Vec<f32>]) -> Result<()> {
        let tx = self.conn.transaction().context("Failed to begin transaction")?;
        {
            let sql = format!("INSERT INTO {} (idx, vector) VALUES (?1, ?2)", table.name());
            let mut stmt = tx.prepare(&sql).context("Failed to prepare statement")?;
            for (idx, vector) in vectors.iter().enumerate() {
                let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
                stmt.execute(params![idx as i64, bytes])
                    .context(format!("Failed to insert {} vector {idx}", table.name()))?;
            }
        }
        tx.commit().context("Failed to commit vectors")?;
        Ok(())
    }

    pub fn insert_summaries(&mut self, summaries: &ClusterSummary) -> Result<()> {
        let tx = self.conn.transaction().context("Failed to begin transaction")?;
        for (cluster, keywords) in summaries {
            tx.execute(
                "INSERT INTO summaries (cluster, keywords) VALUES (?1, ?2)",
                params![cluster, keywords],
            )
            .context(format!("Failed to insert summary for cluster {cluster}"))?;
        }
        tx.commit().context("Failed to commit summaries")?;
        Ok(())
    }

    pub fn get_rows(&self) -> Result<Vec<ResultRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT external_id, text, cluster, keywords FROM rows ORDER BY idx")
            .context("Failed to prepare statement")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ResultRow {
                    external_id: row.get(0)?,
                    text: row.get(1)?,
                    cluster: row.get(2)?,
                    keywords: row.get(3)?,
                })
            })
            .context("Failed to query rows")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect rows")?;

        Ok(rows)
    }

    pub fn get_vectors(&self, table: VectorTable) -> Result<Vec<Vec<f32>>> {
        let sql = format!("SELECT vector FROM {} ORDER BY idx", table.name());
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare statement")?;

        let blobs = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))
            .context(format!("Failed to query {}", table.name()))?
            .collect::<Result<Vec<_>, _>>()
            .context(format!("Failed to collect {}", table.name()))?;

        blobs
            .into_iter()
            .enumerate()
            .map(|(idx, bytes)| {
                if bytes.len() % 4 != 0 {
                    bail!("{} vector {idx} has a truncated blob", table.name());
                }
                Ok(bytes
                    .chunks_exact(4)
                    .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect::<Vec<f32>>())
            })
            .collect()
    }

    pub fn get_summaries(&self) -> Result<ClusterSummary> {
        let mut stmt = self
            .conn
            .prepare("SELECT cluster, keywords FROM summaries")
            .context("Failed to prepare statement")?;

        let summaries = stmt
            .query_map([], |row| Ok((row.get::<_, i32>(0)?, row.get::<_, String>(1)?)))
            .context("Failed to query summaries")?
            .collect::<Result<ClusterSummary, _>>()
            .context("Failed to collect summaries")?;

        Ok(summaries)
    }

    /// Save database to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        // VACUUM INTO refuses to overwrite an existing file.
        let _ = std::fs::remove_file(path);
        let safe_path = path.to_string_lossy().replace('\'', "''");
        let sql = format!("VACUUM INTO '{}'", safe_path);
        self.conn
            .execute_batch(&sql)
            .context(format!("Failed to save database to {}", path.display()))?;

        Ok(())
    }
}

/// Tables holding one vector per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorTable {
    Embeddings,
    Reduced,
}

impl VectorTable {
    fn name(self) -> &'static str {
        match self {
            VectorTable::Embeddings => "embeddings",
            VectorTable::Reduced => "reduced",
        }
    }
}
