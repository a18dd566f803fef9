//! Object graph primitives: blobs, trees, commits and branch refs.
//!
//! `GithubGraph` talks to the GitHub git data API; tests run the same
//! orchestration against `memory::MemoryGraph`.

pub mod github;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;

pub use github::GithubGraph;

/// Git mode for a regular, non-executable file.
pub const FILE_MODE: &str = "100644";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobEncoding {
    Utf8,
    Base64,
}

impl BlobEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobEncoding::Utf8 => "utf-8",
            BlobEncoding::Base64 => "base64",
        }
    }
}

/// One path in a new tree. `blob: None` removes the path from the base tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub blob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub tree: String,
    pub parents: Vec<String>,
}

#[async_trait]
pub trait ObjectGraph: Send + Sync {
    /// Human readable repository identifier, e.g. `owner/name`
    fn describe(&self) -> String;

    async fn default_branch(&self) -> Result<String, StoreError>;

    /// Current head of `branch`, `None` when the branch (or repository) is empty
    async fn get_head_ref(&self, branch: &str) -> Result<Option<String>, StoreError>;

    async fn get_commit(&self, sha: &str) -> Result<CommitInfo, StoreError>;

    /// `content` is already in the wire form named by `encoding`
    async fn create_blob(&self, content: &str, encoding: BlobEncoding) -> Result<String, StoreError>;

    async fn create_tree(&self, base_tree: Option<&str>, entries: &[TreeEntry]) -> Result<String, StoreError>;

    async fn create_commit(&self, message: &str, tree: &str, parent: Option<&str>) -> Result<String, StoreError>;

    /// Fast-forward `branch` to `sha`. A rejected update is `StoreError::Conflict`.
    async fn update_ref(&self, branch: &str, sha: &str) -> Result<(), StoreError>;

    /// Create `branch` at `sha`. An existing ref is `StoreError::Conflict`.
    async fn create_ref(&self, branch: &str, sha: &str) -> Result<(), StoreError>;

    /// Raw bytes of `path` at `reference` (default branch when `None`)
    async fn get_content(&self, path: &str, reference: Option<&str>) -> Result<Option<Vec<u8>>, StoreError>;
}
