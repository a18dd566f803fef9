//! Append-only, month-sharded JSONL logs with idempotency keys.
//!
//! An entry is appended only if no line of its month shard already carries
//! the same key, so a retried submission never double counts.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::commit::{BranchHead, FileChange};
use crate::error::StoreError;
use crate::index::absorb_conflict;
use crate::remote::RemoteFiles;

pub trait LogEntry: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Directory of the log family, e.g. `game/xp`
    const FAMILY: &'static str;

    fn date(&self) -> &str;
    fn source(&self) -> &str;
    fn idempotency_key(&self) -> &str;
    /// Secondary sort key after the date
    fn tiebreak(&self) -> &str;
    fn commit_message(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    Skipped,
}

/// Whole-file access to log shards.
#[async_trait]
pub trait LogBackend: Send + Sync {
    async fn read(&self, path: &str) -> Result<Option<String>, StoreError>;

    /// Content plus the revision it was read at, for a following `write`.
    /// Backends without revisions return `None`.
    async fn read_for_update(&self, path: &str) -> Result<(Option<String>, Option<BranchHead>), StoreError> {
        Ok((self.read(path).await?, None))
    }

    /// Replace the file. With a `base`, fails with `Conflict` when the store
    /// has moved past it.
    async fn write(
        &self,
        path: &str,
        content: String,
        message: &str,
        base: Option<&BranchHead>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl LogBackend for RemoteFiles {
    async fn read(&self, path: &str) -> Result<Option<String>, StoreError> {
        self.read_text(path).await
    }

    async fn read_for_update(&self, path: &str) -> Result<(Option<String>, Option<BranchHead>), StoreError> {
        let base = self.head().await?;
        let content = self.read_text_at(path, &base).await?;
        Ok((content, Some(base)))
    }

    async fn write(
        &self,
        path: &str,
        content: String,
        message: &str,
        base: Option<&BranchHead>,
    ) -> Result<(), StoreError> {
        let changes = vec![FileChange::text(path, content)];
        match base {
            Some(base) => self.commit_on(base, message, changes).await?,
            None => self.commit(message, changes).await?,
        };
        Ok(())
    }
}

/// `{source}:{subject}:{date}`
pub fn idempotency_key(source: &str, subject: &str, date: &str) -> String {
    format!("{}:{}:{}", source, subject, date)
}

pub fn parse_date(input: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| StoreError::Invalid(format!("'{}' is not a YYYY-MM-DD date", input)))
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Month keys from the month of `from` through the month of `to`, inclusive.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> Vec<String> {
    let mut months = Vec::new();
    let (mut year, mut month) = (from.year(), from.month());
    while (year, month) <= (to.year(), to.month()) {
        months.push(format!("{:04}-{:02}", year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

fn contains_key(content: &str, key: &str) -> bool {
    content.lines().any(|line| {
        serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|v| v.get("idempotency_key")?.as_str().map(|k| k == key))
            .unwrap_or(false)
    })
}

pub struct EventLog<E: LogEntry> {
    backend: Arc<dyn LogBackend>,
    lock: Mutex<()>,
    conflict_retries: u32,
    _entry: PhantomData<fn() -> E>,
}

impl<E: LogEntry> EventLog<E> {
    pub fn new(backend: Arc<dyn LogBackend>, conflict_retries: u32) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
            conflict_retries,
            _entry: PhantomData,
        }
    }

    pub fn shard_path(month: &str) -> String {
        format!("{}/{}.jsonl", E::FAMILY, month)
    }

    pub async fn append(&self, entry: &E) -> Result<AppendOutcome, StoreError> {
        let date = parse_date(entry.date())?;
        let path = Self::shard_path(&month_key(date));
        let key = entry.idempotency_key();
        let line = serde_json::to_string(entry)?;

        let _guard = self.lock.lock().await;
        let mut attempt = 0;
        loop {
            let (previous, base) = self.backend.read_for_update(&path).await?;
            let previous = previous.unwrap_or_default();
            if !key.is_empty() && contains_key(&previous, key) {
                log::warn!("[EVENT_LOG] Skipping duplicate {} event {}", E::FAMILY, key);
                return Ok(AppendOutcome::Skipped);
            }

            let trimmed = previous.trim_end_matches(['\n', '\r']);
            let next = if trimmed.trim().is_empty() {
                format!("{}\n", line)
            } else {
                format!("{}\n{}\n", trimmed, line)
            };

            match self
                .backend
                .write(&path, next, &entry.commit_message(), base.as_ref())
                .await
            {
                Ok(()) => return Ok(AppendOutcome::Appended),
                Err(e) => absorb_conflict("EVENT_LOG", &mut attempt, self.conflict_retries, e)?,
            }
        }
    }

    /// Entries of one month shard; malformed lines are skipped.
    pub async fn read_month(&self, month: &str) -> Result<Vec<E>, StoreError> {
        let path = Self::shard_path(month);
        let Some(content) = self.backend.read(&path).await? else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<E>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("[EVENT_LOG] {}:{} skipped malformed line: {}", path, n + 1, e),
            }
        }
        Ok(entries)
    }

    /// Entries dated within `[from, to]`, optionally restricted to `sources`,
    /// sorted by date then tiebreak.
    pub async fn read_range(&self, from: NaiveDate, to: NaiveDate, sources: &[String]) -> Result<Vec<E>, StoreError> {
        if from > to {
            return Err(StoreError::Invalid(format!("range start {} is after end {}", from, to)));
        }
        let mut out = Vec::new();
        for month in months_between(from, to) {
            for entry in self.read_month(&month).await? {
                let Ok(date) = NaiveDate::parse_from_str(entry.date(), "%Y-%m-%d") else {
                    continue;
                };
                if date < from || date > to {
                    continue;
                }
                if !sources.is_empty() && !sources.iter().any(|s| s == entry.source()) {
                    continue;
                }
                out.push(entry);
            }
        }
        out.sort_by(|a, b| a.date().cmp(b.date()).then_with(|| a.tiebreak().cmp(b.tiebreak())));
        Ok(out)
    }
}
