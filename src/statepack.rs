use anyhow::{bail, Context, Result};
use chrono::{Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::KeywordConfig;
use crate::db::{StateDb, VectorTable};
use crate::engine::PipelineState;
use crate::table::Record;

pub const FORMAT_VERSION: &str = "1.0.0";

const DB_ENTRY: &str = "state.sqlite";
const MANIFEST_ENTRY: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateManifest {
    pub version: String,
    pub created_at: String,
    pub generator: String,
    pub embedding_model: String,
    pub stats: ManifestStats,
    /// Keyword settings the summaries were built with, reused when they are
    /// refreshed after a reload. Packs without the field get the defaults.
    #[serde(default)]
    pub keywords: KeywordConfig,
    /// Hex SHA-256 of the `state.sqlite` entry.
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestStats {
    pub row_count: usize,
    pub cluster_count: usize,
    pub noise_count: usize,
    pub embedding_dim: usize,
    pub reduced_dim: usize,
}

pub struct StatePackWriter {
    db: StateDb,
    manifest: StateManifest,
}

impl StatePackWriter {
    /// Load `state` into an in-memory database ready to be packed.
    pub fn new(
        state: &PipelineState,
        embedding_model: impl Into<String>,
        keywords: &KeywordConfig,
    ) -> Result<Self> {
        let mut db = StateDb::new_in_memory().context("Failed to create in-memory database")?;
        db.insert_rows(state.results.rows())?;
        db.insert_vectors(VectorTable::Embeddings, &state.embeddings)?;
        db.insert_vectors(VectorTable::Reduced, &state.reduced)?;
        db.insert_summaries(&state.summaries)?;

        let manifest = StateManifest {
            version: FORMAT_VERSION.to_string(),
            created_at: Utc::now().to_rfc3339(),
            generator: format!("ticketlens v{}", env!("CARGO_PKG_VERSION")),
            embedding_model: embedding_model.into(),
            stats: ManifestStats {
                row_count: state.results.len(),
                cluster_count: state.results.cluster_count(),
                noise_count: state.results.noise_count(),
                embedding_dim: state.embeddings.first().map_or(0, Vec::len),
                reduced_dim: state.reduced.first().map_or(0, Vec::len),
            },
            keywords: keywords.clone(),
            checksum: String::new(),
        };

        Ok(Self { db, manifest })
    }

    pub fn manifest(&self) -> &StateManifest {
        &self.manifest
    }

    /// Write the archive next to `output_path` and rename it into place, so a
    /// failed write leaves any earlier pack intact.
    pub fn write_to_file(&mut self, output_path: &Path) -> Result<()> {
        info!(path = %output_path.display(), "writing state pack");

        let temp_db_path = sibling(output_path, "tmp.db");
        self.db
            .save_to_file(&temp_db_path)
            .context("Failed to save database to temporary file")?;
        let mut db_contents = Vec::new();
        File::open(&temp_db_path)
            .context("Failed to open temporary database file")?
            .read_to_end(&mut db_contents)
            .context("Failed to read database contents")?;
        std::fs::remove_file(&temp_db_path).context("Failed to remove temporary database file")?;

        self.manifest.checksum = hex::encode(Sha256::digest(&db_contents));

        let partial_path = sibling(output_path, "partial");
        let file = File::create(&partial_path)
            .context(format!("Failed to create output file: {}", partial_path.display()))?;
        let mut zip = ZipWriter::new(file);
        let now = chrono::Local::now();
        let options: FileOptions<'_, ()> = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644)
            .last_modified_time(
                zip::DateTime::from_date_and_time(
                    now.year() as u16,
                    now.month() as u8,
                    now.day() as u8,
                    now.hour() as u8,
                    now.minute() as u8,
                    now.second() as u8,
                )
                .unwrap_or_default(),
            );

        debug!("adding {DB_ENTRY} to archive");
        zip.start_file(DB_ENTRY, options)
            .context("Failed to start database file in ZIP")?;
        zip.write_all(&db_contents)
            .context("Failed to write database to ZIP")?;

        debug!("adding {MANIFEST_ENTRY} to archive");
        zip.start_file(MANIFEST_ENTRY, options)
            .context("Failed to start manifest file in ZIP")?;
        let manifest_json =
            serde_json::to_string_pretty(&self.manifest).context("Failed to serialize manifest")?;
        zip.write_all(manifest_json.as_bytes())
            .context("Failed to write manifest to ZIP")?;

        zip.finish().context("Failed to finalize ZIP file")?;
        std::fs::rename(&partial_path, output_path)
            .context(format!("Failed to move state pack to {}", output_path.display()))?;

        info!(
            rows = self.manifest.stats.row_count,
            clusters = self.manifest.stats.cluster_count,
            noise = self.manifest.stats.noise_count,
            "state pack written"
        );
        Ok(())
    }
}

pub struct StatePackReader {
    pub manifest: StateManifest,
    state: PipelineState,
}

impl StatePackReader {
    /// Open, verify and fully load a state pack.
    pub fn open(pack_path: &Path) -> Result<Self> {
        info!(path = %pack_path.display(), "opening state pack");

        let file = File::open(pack_path)
            .context(format!("Failed to open state pack: {}", pack_path.display()))?;
        let mut archive = ZipArchive::new(file).context("Failed to read ZIP archive")?;

        let manifest: StateManifest = {
            let mut manifest_file = archive
                .by_name(MANIFEST_ENTRY)
                .context("manifest.json not found in state pack")?;
            let mut contents = String::new();
            manifest_file
                .read_to_string(&mut contents)
                .context("Failed to read manifest")?;
            serde_json::from_str(&contents).context("Failed to parse manifest.json")?
        };

        let db_contents = {
            let mut db_file = archive
                .by_name(DB_ENTRY)
                .context("state.sqlite not found in archive")?;
            let mut contents = Vec::new();
            db_file
                .read_to_end(&mut contents)
                .context("Failed to read database from archive")?;
            contents
        };

        let checksum = hex::encode(Sha256::digest(&db_contents));
        if checksum != manifest.checksum {
            bail!(
                "state.sqlite checksum mismatch: manifest says {}, archive holds {}",
                manifest.checksum,
                checksum
            );
        }

        let temp_db_path = sibling(pack_path, "extracted.db");
        File::create(&temp_db_path)
            .context("Failed to create temporary database file")?
            .write_all(&db_contents)
            .context("Failed to write temporary database file")?;
        let loaded = load_state(&temp_db_path);
        let _ = std::fs::remove_file(&temp_db_path);
        let state = loaded?;

        if state.results.len() != manifest.stats.row_count {
            bail!(
                "manifest lists {} rows but the database holds {}",
                manifest.stats.row_count,
                state.results.len()
            );
        }

        info!(rows = state.results.len(), "state pack loaded");
        Ok(Self { manifest, state })
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn into_state(self) -> PipelineState {
        self.state
    }
}

fn load_state(db_path: &Path) -> Result<PipelineState> {
    let db = StateDb::open(db_path).context("Failed to open extracted database")?;
    let rows = db.get_rows()?;
    let embeddings = db.get_vectors(VectorTable::Embeddings)?;
    let reduced = db.get_vectors(VectorTable::Reduced)?;
    let summaries = db.get_summaries()?;

    let records: Vec<Record> = rows
        .iter()
        .map(|r| Record {
            text: r.text.clone(),
            external_id: r.external_id.clone(),
        })
        .collect();
    let partition = rows.iter().map(|r| r.cluster).collect();

    let state = PipelineState::new(records, embeddings, reduced, partition, summaries)
        .context("Stored state is inconsistent")?;
    if state.results.rows() != rows.as_slice() {
        bail!("stored rows disagree with stored summaries");
    }
    Ok(state)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
