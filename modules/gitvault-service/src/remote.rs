//! File level access to the backing repository.

use std::sync::Arc;

use crate::commit::{BranchHead, CommitOrchestrator, CommitOutcome, FileChange};
use crate::error::StoreError;
use crate::graph::ObjectGraph;
use crate::retry::{RetryPolicy, with_retry};

pub struct RemoteFiles {
    committer: CommitOrchestrator,
    retry: RetryPolicy,
}

impl RemoteFiles {
    pub fn new(graph: Arc<dyn ObjectGraph>, branch: Option<String>, retry: RetryPolicy) -> Self {
        Self {
            committer: CommitOrchestrator::new(graph, branch),
            retry,
        }
    }

    pub fn describe(&self) -> String {
        self.committer.graph().describe()
    }

    /// Current head of the working branch.
    pub async fn head(&self) -> Result<BranchHead, StoreError> {
        with_retry(&self.retry, "branch head", || self.committer.branch_head()).await
    }

    /// Read a UTF-8 file from the working branch, `None` when absent.
    pub async fn read_text(&self, path: &str) -> Result<Option<String>, StoreError> {
        self.read_ref(path, self.committer.configured_branch()).await
    }

    /// Read a UTF-8 file as of `base`. Nothing exists before the first commit.
    pub async fn read_text_at(&self, path: &str, base: &BranchHead) -> Result<Option<String>, StoreError> {
        match &base.head {
            Some(sha) => self.read_ref(path, Some(sha)).await,
            None => Ok(None),
        }
    }

    async fn read_ref(&self, path: &str, reference: Option<&str>) -> Result<Option<String>, StoreError> {
        let graph = self.committer.graph();
        let bytes = with_retry(&self.retry, path, || graph.get_content(path, reference)).await?;
        bytes
            .map(|b| {
                String::from_utf8(b).map_err(|_| StoreError::Invalid(format!("{} is not valid UTF-8", path)))
            })
            .transpose()
    }

    pub async fn commit(&self, message: &str, changes: Vec<FileChange>) -> Result<CommitOutcome, StoreError> {
        let base = self.committer.branch_head().await?;
        self.commit_on(&base, message, changes).await
    }

    /// Commit on top of `base`; `Conflict` when the branch moved since.
    pub async fn commit_on(
        &self,
        base: &BranchHead,
        message: &str,
        changes: Vec<FileChange>,
    ) -> Result<CommitOutcome, StoreError> {
        let outcome = self.committer.commit_files_on(base, message, changes).await?;
        log::debug!(
            "[REMOTE] {} advanced {} -> {}",
            outcome.branch,
            outcome.parent.as_deref().unwrap_or("(root)"),
            outcome.commit_sha
        );
        Ok(outcome)
    }
}
