//! Durable storage for pause records.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use weft_core::{ExecutionId, NodeId};

use crate::error::ExecutionError;
use crate::pause::{record_key, PauseRecord};

/// Store for pause records, keyed by `(execution_id, node_id)`.
///
/// Records are created when a node pauses and destroyed when it resumes
/// or the execution is cancelled. Implementations must make `save` +
/// `remove` of the same key safe under concurrency; the engine serialises
/// resume per record.
#[async_trait]
pub trait PauseJournal: Send + Sync {
    /// Persist a record, replacing any previous record for the same key.
    async fn save(&self, record: &PauseRecord) -> Result<(), ExecutionError>;

    /// Load the record for an execution/node pair.
    async fn load(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
    ) -> Result<Option<PauseRecord>, ExecutionError>;

    /// Remove the record for an execution/node pair. Missing keys are fine.
    async fn remove(&self, execution_id: ExecutionId, node_id: NodeId)
        -> Result<(), ExecutionError>;

    /// All records belonging to one execution.
    async fn list_for_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<PauseRecord>, ExecutionError>;
}

/// In-memory journal for tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    records: DashMap<String, PauseRecord>,
}

impl MemoryJournal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no records exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl PauseJournal for MemoryJournal {
    async fn save(&self, record: &PauseRecord) -> Result<(), ExecutionError> {
        self.records.insert(record.key(), record.clone());
        Ok(())
    }

    async fn load(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
    ) -> Result<Option<PauseRecord>, ExecutionError> {
        Ok(self
            .records
            .get(&record_key(execution_id, node_id))
            .map(|entry| entry.clone()))
    }

    async fn remove(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
    ) -> Result<(), ExecutionError> {
        self.records.remove(&record_key(execution_id, node_id));
        Ok(())
    }

    async fn list_for_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<PauseRecord>, ExecutionError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.execution_id == execution_id)
            .map(|entry| entry.clone())
            .collect())
    }
}

/// File-backed journal: one JSON file per record under a directory.
///
/// This is what makes pause records survive process restarts. Writes go
/// through a temp file + rename so a crash never leaves a torn record.
#[derive(Debug)]
pub struct FileJournal {
    dir: PathBuf,
}

impl FileJournal {
    /// Open (creating if needed) a journal rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, ExecutionError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, execution_id: ExecutionId, node_id: NodeId) -> PathBuf {
        self.dir
            .join(format!("{}.json", record_key(execution_id, node_id)))
    }
}

#[async_trait]
impl PauseJournal for FileJournal {
    async fn save(&self, record: &PauseRecord) -> Result<(), ExecutionError> {
        let path = self.path_for(record.execution_id, record.node_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
    ) -> Result<Option<PauseRecord>, ExecutionError> {
        let path = self.path_for(execution_id, node_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
    ) -> Result<(), ExecutionError> {
        let path = self.path_for(execution_id, node_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_for_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<PauseRecord>, ExecutionError> {
        let prefix = format!("{execution_id}:");
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            let bytes = tokio::fs::read(entry.path()).await?;
            records.push(serde_json::from_slice(&bytes)?);
        }
        Ok(records)
    }
}
