//! Index synchronizer.
//!
//! Every domain keeps a JSON array of projections of its primary files. Each
//! mutation writes the primary file and the rewritten index in one commit,
//! so the two never disagree on the branch.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use gitvault_types::RecordFile;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::codec::{self, Frontmatter};
use crate::commit::{BranchHead, FileChange};
use crate::error::StoreError;
use crate::remote::RemoteFiles;

pub trait IndexEntry: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn key(&self) -> &str;
    fn file_path(&self) -> &str;
}

/// Storage layout and projection rules of one record family.
pub trait Domain: Send + Sync + 'static {
    type Frontmatter: Frontmatter + Clone + Send + Sync + 'static;
    type Entry: IndexEntry;

    /// Scope used in commit messages
    const LABEL: &'static str;
    const INDEX_PATH: &'static str;

    fn key(fm: &Self::Frontmatter) -> &str;
    fn title(fm: &Self::Frontmatter) -> &str;
    fn record_path(fm: &Self::Frontmatter) -> String;
    fn project(fm: &Self::Frontmatter, file_path: &str) -> Self::Entry;

    /// Place `entry` in the index, replacing any entry with the same key.
    /// Newest first unless a domain orders differently.
    fn insert(index: &mut Vec<Self::Entry>, entry: Self::Entry) {
        index.retain(|e| e.key() != entry.key());
        index.insert(0, entry);
    }

    fn create_message(fm: &Self::Frontmatter) -> String {
        format!("feat({}): add {} - {}", Self::LABEL, Self::key(fm), Self::title(fm))
    }

    fn update_message(fm: &Self::Frontmatter) -> String {
        format!("feat({}): update {} - {}", Self::LABEL, Self::key(fm), Self::title(fm))
    }

    fn delete_message(entry: &Self::Entry) -> String {
        format!("feat({}): delete {}", Self::LABEL, entry.file_path())
    }
}

pub type Patch<'a, F> = &'a mut (dyn FnMut(&mut RecordFile<F>) + Send);

#[async_trait]
pub trait RecordBackend<D: Domain>: Send + Sync {
    async fn list(&self) -> Result<Vec<D::Entry>, StoreError>;

    async fn read_path(&self, path: &str) -> Result<Option<RecordFile<D::Frontmatter>>, StoreError>;

    /// Write a record and its index entry, replacing any record with the same key.
    /// `attachments` are committed alongside.
    async fn put(
        &self,
        record: RecordFile<D::Frontmatter>,
        attachments: Vec<FileChange>,
    ) -> Result<D::Entry, StoreError>;

    /// Apply `patch` to the record under `key`; `None` when no such record exists.
    async fn update(
        &self,
        key: &str,
        patch: Patch<'_, D::Frontmatter>,
    ) -> Result<Option<RecordFile<D::Frontmatter>>, StoreError>;

    async fn delete(&self, key: &str) -> Result<Option<D::Entry>, StoreError>;
}

/// Swallow a conflict while re-run budget remains, so the caller re-reads
/// and recomputes. Any other error, or an exhausted budget, propagates.
pub(crate) fn absorb_conflict(label: &str, attempt: &mut u32, max: u32, err: StoreError) -> Result<(), StoreError> {
    match err {
        StoreError::Conflict(reason) if *attempt < max => {
            *attempt += 1;
            log::warn!(
                "[{}] Branch moved during write ({}), re-reading (attempt {}/{})",
                label,
                reason,
                attempt,
                max
            );
            Ok(())
        }
        other => Err(other),
    }
}

pub struct RemoteRecords<D: Domain> {
    files: Arc<RemoteFiles>,
    lock: Mutex<()>,
    conflict_retries: u32,
    _domain: PhantomData<fn() -> D>,
}

impl<D: Domain> RemoteRecords<D> {
    pub fn new(files: Arc<RemoteFiles>, conflict_retries: u32) -> Self {
        Self {
            files,
            lock: Mutex::new(()),
            conflict_retries,
            _domain: PhantomData,
        }
    }

    async fn read_record_at(
        &self,
        path: &str,
        base: &BranchHead,
    ) -> Result<Option<RecordFile<D::Frontmatter>>, StoreError> {
        let text = self.files.read_text_at(path, base).await?;
        parse_record::<D>(path, text)
    }
}

fn parse_index<D: Domain>(body: Option<String>) -> Result<Vec<D::Entry>, StoreError> {
    match body {
        Some(body) if !body.trim().is_empty() => Ok(serde_json::from_str(&body)?),
        _ => Ok(Vec::new()),
    }
}

fn parse_record<D: Domain>(path: &str, text: Option<String>) -> Result<Option<RecordFile<D::Frontmatter>>, StoreError> {
    let Some(text) = text else {
        return Ok(None);
    };
    codec::parse(&text).map(Some).map_err(|source| StoreError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Index of `D` as of `base`.
pub(crate) async fn read_index_at<D: Domain>(files: &RemoteFiles, base: &BranchHead) -> Result<Vec<D::Entry>, StoreError> {
    parse_index::<D>(files.read_text_at(D::INDEX_PATH, base).await?)
}

pub(crate) fn index_change<D: Domain>(index: &[D::Entry]) -> Result<FileChange, StoreError> {
    Ok(FileChange::text(D::INDEX_PATH, serde_json::to_string_pretty(index)?))
}

#[async_trait]
impl<D: Domain> RecordBackend<D> for RemoteRecords<D> {
    async fn list(&self) -> Result<Vec<D::Entry>, StoreError> {
        parse_index::<D>(self.files.read_text(D::INDEX_PATH).await?)
    }

    async fn read_path(&self, path: &str) -> Result<Option<RecordFile<D::Frontmatter>>, StoreError> {
        parse_record::<D>(path, self.files.read_text(path).await?)
    }

    async fn put(
        &self,
        record: RecordFile<D::Frontmatter>,
        attachments: Vec<FileChange>,
    ) -> Result<D::Entry, StoreError> {
        let path = D::record_path(&record.frontmatter);
        let body = codec::serialize(&record);
        let entry = D::project(&record.frontmatter, &path);
        let message = D::create_message(&record.frontmatter);

        let _guard = self.lock.lock().await;
        let mut attempt = 0;
        loop {
            let base = self.files.head().await?;
            let mut index = read_index_at::<D>(&self.files, &base).await?;
            D::insert(&mut index, entry.clone());

            let mut changes = attachments.clone();
            changes.push(FileChange::text(&path, body.clone()));
            changes.push(index_change::<D>(&index)?);

            match self.files.commit_on(&base, &message, changes).await {
                Ok(_) => return Ok(entry),
                Err(e) => absorb_conflict(D::LABEL, &mut attempt, self.conflict_retries, e)?,
            }
        }
    }

    async fn update(
        &self,
        key: &str,
        patch: Patch<'_, D::Frontmatter>,
    ) -> Result<Option<RecordFile<D::Frontmatter>>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut attempt = 0;
        loop {
            let base = self.files.head().await?;
            let mut index = read_index_at::<D>(&self.files, &base).await?;
            let Some(pos) = index.iter().position(|e| e.key() == key) else {
                return Ok(None);
            };
            let path = index[pos].file_path().to_string();
            let Some(mut file) = self.read_record_at(&path, &base).await? else {
                log::warn!("[{}] Index points at missing file {}", D::LABEL, path);
                return Ok(None);
            };

            patch(&mut file);
            index[pos] = D::project(&file.frontmatter, &path);

            let changes = vec![
                FileChange::text(&path, codec::serialize(&file)),
                index_change::<D>(&index)?,
            ];
            match self.files.commit_on(&base, &D::update_message(&file.frontmatter), changes).await {
                Ok(_) => return Ok(Some(file)),
                Err(e) => absorb_conflict(D::LABEL, &mut attempt, self.conflict_retries, e)?,
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<Option<D::Entry>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut attempt = 0;
        loop {
            let base = self.files.head().await?;
            let mut index = read_index_at::<D>(&self.files, &base).await?;
            let Some(pos) = index.iter().position(|e| e.key() == key) else {
                return Ok(None);
            };
            let entry = index.remove(pos);

            let changes = vec![
                FileChange::delete(entry.file_path()),
                index_change::<D>(&index)?,
            ];
            match self.files.commit_on(&base, &D::delete_message(&entry), changes).await {
                Ok(_) => return Ok(Some(entry)),
                Err(e) => absorb_conflict(D::LABEL, &mut attempt, self.conflict_retries, e)?,
            }
        }
    }
}

/// Domain facing record store over either backend.
pub struct Records<D: Domain> {
    backend: Arc<dyn RecordBackend<D>>,
}

impl<D: Domain> Records<D> {
    pub fn new(backend: Arc<dyn RecordBackend<D>>) -> Self {
        Self { backend }
    }

    pub async fn list(&self) -> Result<Vec<D::Entry>, StoreError> {
        self.backend.list().await
    }

    pub async fn read(&self, key: &str) -> Result<Option<(D::Entry, RecordFile<D::Frontmatter>)>, StoreError> {
        let Some(entry) = self.backend.list().await?.into_iter().find(|e| e.key() == key) else {
            return Ok(None);
        };
        let file = self.backend.read_path(entry.file_path()).await?;
        Ok(file.map(|file| (entry, file)))
    }

    pub async fn read_path(&self, path: &str) -> Result<Option<RecordFile<D::Frontmatter>>, StoreError> {
        self.backend.read_path(path).await
    }

    pub async fn create(&self, record: RecordFile<D::Frontmatter>) -> Result<D::Entry, StoreError> {
        self.backend.put(record, Vec::new()).await
    }

    pub async fn create_with(
        &self,
        record: RecordFile<D::Frontmatter>,
        attachments: Vec<FileChange>,
    ) -> Result<D::Entry, StoreError> {
        self.backend.put(record, attachments).await
    }

    pub async fn update<P>(&self, key: &str, mut patch: P) -> Result<Option<RecordFile<D::Frontmatter>>, StoreError>
    where
        P: FnMut(&mut RecordFile<D::Frontmatter>) + Send,
    {
        self.backend.update(key, &mut patch).await
    }

    pub async fn delete(&self, key: &str) -> Result<Option<D::Entry>, StoreError> {
        self.backend.delete(key).await
    }
}
