//! In-memory stand-in used when no remote credentials are configured.
//!
//! Same contract as the remote store for indexes, records and logs; nothing
//! survives a restart and binary attachments are discarded.

use std::collections::HashMap;

use async_trait::async_trait;
use gitvault_types::RecordFile;
use parking_lot::Mutex;

use crate::commit::{BranchHead, FileChange};
use crate::error::StoreError;
use crate::event_log::LogBackend;
use crate::index::{Domain, IndexEntry, Patch, RecordBackend};

struct FallbackState<D: Domain> {
    index: Vec<D::Entry>,
    files: HashMap<String, RecordFile<D::Frontmatter>>,
}

pub struct FallbackRecords<D: Domain> {
    state: Mutex<FallbackState<D>>,
}

impl<D: Domain> FallbackRecords<D> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FallbackState {
                index: Vec::new(),
                files: HashMap::new(),
            }),
        }
    }
}

#[async_trait]
impl<D: Domain> RecordBackend<D> for FallbackRecords<D> {
    async fn list(&self) -> Result<Vec<D::Entry>, StoreError> {
        Ok(self.state.lock().index.clone())
    }

    async fn read_path(&self, path: &str) -> Result<Option<RecordFile<D::Frontmatter>>, StoreError> {
        Ok(self.state.lock().files.get(path).cloned())
    }

    async fn put(
        &self,
        record: RecordFile<D::Frontmatter>,
        attachments: Vec<FileChange>,
    ) -> Result<D::Entry, StoreError> {
        if !attachments.is_empty() {
            log::debug!(
                "[FALLBACK] Discarding {} attachment(s) for {} {}",
                attachments.len(),
                D::LABEL,
                D::key(&record.frontmatter)
            );
        }
        let path = D::record_path(&record.frontmatter);
        let entry = D::project(&record.frontmatter, &path);

        let mut state = self.state.lock();
        state.files.insert(path, record);
        D::insert(&mut state.index, entry.clone());
        Ok(entry)
    }

    async fn update(
        &self,
        key: &str,
        patch: Patch<'_, D::Frontmatter>,
    ) -> Result<Option<RecordFile<D::Frontmatter>>, StoreError> {
        let mut state = self.state.lock();
        let FallbackState { index, files } = &mut *state;
        let Some(pos) = index.iter().position(|e| e.key() == key) else {
            return Ok(None);
        };
        let path = index[pos].file_path().to_string();
        let Some(file) = files.get_mut(&path) else {
            return Ok(None);
        };
        patch(file);
        index[pos] = D::project(&file.frontmatter, &path);
        Ok(Some(file.clone()))
    }

    async fn delete(&self, key: &str) -> Result<Option<D::Entry>, StoreError> {
        let mut state = self.state.lock();
        let Some(pos) = state.index.iter().position(|e| e.key() == key) else {
            return Ok(None);
        };
        let entry = state.index.remove(pos);
        state.files.remove(entry.file_path());
        Ok(Some(entry))
    }
}

/// Append-only log files kept in process memory.
#[derive(Default)]
pub struct FallbackLog {
    files: Mutex<HashMap<String, String>>,
}

impl FallbackLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogBackend for FallbackLog {
    async fn read(&self, path: &str) -> Result<Option<String>, StoreError> {
        Ok(self.files.lock().get(path).cloned())
    }

    async fn write(
        &self,
        path: &str,
        content: String,
        _message: &str,
        _base: Option<&BranchHead>,
    ) -> Result<(), StoreError> {
        self.files.lock().insert(path.to_string(), content);
        Ok(())
    }
}
