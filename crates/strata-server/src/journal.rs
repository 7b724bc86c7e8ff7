//! Append-only JSON-lines journal used as the server's persistence sink.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::json;
use strata_registry::{ChunkId, Entity, PersistError, PersistenceSink};

/// Name of the journal file inside the data directory.
pub const JOURNAL_FILE_NAME: &str = "entities.jsonl";

/// Writes one JSON object per persisted entity, tagged with its chunk.
pub struct JournalSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JournalSink {
    /// Opens (or creates) the journal in `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, PersistError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(JOURNAL_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceSink for JournalSink {
    fn persist(&self, chunk_id: ChunkId, entities: &[Entity]) -> Result<(), PersistError> {
        let file = self
            .file
            .lock()
            .map_err(|_| PersistError::Backend("journal lock poisoned".to_string()))?;
        let mut writer = BufWriter::new(&*file);
        for entity in entities {
            let line = json!({ "chunk": chunk_id, "entity": entity });
            serde_json::to_writer(&mut writer, &line)
                .map_err(|err| PersistError::Backend(err.to_string()))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        tracing::trace!(chunk = %chunk_id, entities = entities.len(), "chunk journaled");
        Ok(())
    }
}
