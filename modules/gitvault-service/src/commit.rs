//! Atomic multi-file commits on top of an `ObjectGraph`.
//!
//! One call produces exactly one commit whose tree holds every requested
//! change, or leaves the branch untouched.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::future::try_join_all;

use crate::error::StoreError;
use crate::graph::{BlobEncoding, ObjectGraph, TreeEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Text { path: String, content: String },
    Binary { path: String, bytes: Vec<u8> },
    Delete { path: String },
}

impl FileChange {
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        FileChange::Text {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn binary(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        FileChange::Binary {
            path: path.into(),
            bytes,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        FileChange::Delete { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            FileChange::Text { path, .. } | FileChange::Binary { path, .. } | FileChange::Delete { path } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub commit_sha: String,
    pub branch: String,
    /// Head the commit was built on; `None` for the first commit of a branch
    pub parent: Option<String>,
}

/// Branch head a read-modify-write cycle is based on. Reads pinned to
/// `head` and a commit built on it either land together or fail with
/// `Conflict` once the branch has moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    pub branch: String,
    /// `None` while the branch has no commits
    pub head: Option<String>,
}

pub struct CommitOrchestrator {
    graph: Arc<dyn ObjectGraph>,
    branch: Option<String>,
}

/// Later changes to a path replace earlier ones.
fn collapse(changes: Vec<FileChange>) -> Vec<FileChange> {
    let mut out: Vec<FileChange> = Vec::with_capacity(changes.len());
    for change in changes {
        match out.iter().position(|c| c.path() == change.path()) {
            Some(i) => out[i] = change,
            None => out.push(change),
        }
    }
    out
}

impl CommitOrchestrator {
    pub fn new(graph: Arc<dyn ObjectGraph>, branch: Option<String>) -> Self {
        Self { graph, branch }
    }

    pub fn graph(&self) -> &Arc<dyn ObjectGraph> {
        &self.graph
    }

    pub fn configured_branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub async fn resolve_branch(&self) -> Result<String, StoreError> {
        match &self.branch {
            Some(branch) => Ok(branch.clone()),
            None => self.graph.default_branch().await,
        }
    }

    pub async fn branch_head(&self) -> Result<BranchHead, StoreError> {
        let branch = self.resolve_branch().await?;
        let head = self.graph.get_head_ref(&branch).await?;
        Ok(BranchHead { branch, head })
    }

    /// Commit on whatever the branch head is right now.
    pub async fn commit_files(&self, message: &str, changes: Vec<FileChange>) -> Result<CommitOutcome, StoreError> {
        let base = self.branch_head().await?;
        self.commit_files_on(&base, message, changes).await
    }

    /// Commit with `base.head` as the parent. Fails with `Conflict` when the
    /// branch no longer points at it (or was created meanwhile).
    pub async fn commit_files_on(
        &self,
        base: &BranchHead,
        message: &str,
        changes: Vec<FileChange>,
    ) -> Result<CommitOutcome, StoreError> {
        let changes = collapse(changes);
        if changes.is_empty() {
            log::warn!("[COMMIT] '{}' has no file changes, committing an unchanged tree", message);
        }

        let branch = base.branch.clone();
        let head = base.head.clone();
        let base_tree = match &head {
            Some(sha) => Some(self.graph.get_commit(sha).await?.tree),
            None => None,
        };

        let graph = &self.graph;
        let blobs = try_join_all(changes.iter().map(|change| async move {
            match change {
                FileChange::Text { content, .. } => graph
                    .create_blob(content, BlobEncoding::Utf8)
                    .await
                    .map(Some),
                FileChange::Binary { bytes, .. } => {
                    let encoded = BASE64.encode(bytes);
                    graph.create_blob(&encoded, BlobEncoding::Base64).await.map(Some)
                }
                FileChange::Delete { .. } => Ok(None),
            }
        }))
        .await?;

        let entries: Vec<TreeEntry> = changes
            .iter()
            .zip(blobs)
            // nothing to delete on a branch without history
            .filter(|(change, _)| base_tree.is_some() || !matches!(change, FileChange::Delete { .. }))
            .map(|(change, blob)| TreeEntry {
                path: change.path().to_string(),
                blob,
            })
            .collect();

        let tree = self.graph.create_tree(base_tree.as_deref(), &entries).await?;
        let commit_sha = self.graph.create_commit(message, &tree, head.as_deref()).await?;

        match &head {
            Some(_) => self.graph.update_ref(&branch, &commit_sha).await?,
            None => self.graph.create_ref(&branch, &commit_sha).await?,
        }

        log::info!(
            "[COMMIT] {} -> {} ({} files): {}",
            branch,
            &commit_sha[..commit_sha.len().min(7)],
            entries.len(),
            message
        );

        Ok(CommitOutcome {
            commit_sha,
            branch,
            parent: head,
        })
    }
}
