//! In-memory object graph with git-style content addressing.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use sha1::{Digest, Sha1};

use super::{BlobEncoding, CommitInfo, FILE_MODE, ObjectGraph, TreeEntry};
use crate::error::StoreError;

#[derive(Default)]
struct GraphState {
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, BTreeMap<String, String>>,
    commits: HashMap<String, CommitInfo>,
    messages: HashMap<String, String>,
    refs: HashMap<String, String>,
    calls: HashMap<&'static str, usize>,
    failures: Vec<&'static str>,
    racer: Option<Vec<(String, String)>>,
    read_racer: Option<Vec<(String, String)>>,
}

pub struct MemoryGraph {
    default_branch: String,
    state: Mutex<GraphState>,
}

fn object_id(kind: &str, bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {}\0", kind, bytes.len()).as_bytes());
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

impl GraphState {
    fn record_call(&mut self, op: &'static str) -> Result<(), StoreError> {
        *self.calls.entry(op).or_default() += 1;
        if let Some(pos) = self.failures.iter().position(|f| *f == op) {
            self.failures.remove(pos);
            return Err(StoreError::Remote {
                context: op.to_string(),
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn put_blob(&mut self, bytes: Vec<u8>) -> String {
        let sha = object_id("blob", &bytes);
        self.blobs.insert(sha.clone(), bytes);
        sha
    }

    fn put_tree(&mut self, entries: BTreeMap<String, String>) -> String {
        let mut bytes = Vec::new();
        for (path, blob) in &entries {
            bytes.extend_from_slice(format!("{} {}\0{}", FILE_MODE, path, blob).as_bytes());
        }
        let sha = object_id("tree", &bytes);
        self.trees.insert(sha.clone(), entries);
        sha
    }

    fn put_commit(&mut self, message: &str, tree: &str, parent: Option<&str>) -> String {
        let text = format!(
            "tree {}\nparent {}\nseq {}\n\n{}",
            tree,
            parent.unwrap_or(""),
            self.commits.len(),
            message
        );
        let sha = object_id("commit", text.as_bytes());
        self.commits.insert(
            sha.clone(),
            CommitInfo {
                sha: sha.clone(),
                tree: tree.to_string(),
                parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
            },
        );
        self.messages.insert(sha.clone(), message.to_string());
        sha
    }

    fn tree_of_branch(&self, branch: &str) -> Option<&BTreeMap<String, String>> {
        let head = self.refs.get(branch)?;
        self.tree_of_commit(head)
    }

    fn tree_of_commit(&self, sha: &str) -> Option<&BTreeMap<String, String>> {
        let commit = self.commits.get(sha)?;
        self.trees.get(&commit.tree)
    }

    /// A reference is a branch name or a commit sha.
    fn tree_at(&self, reference: &str) -> Option<&BTreeMap<String, String>> {
        if self.refs.contains_key(reference) {
            self.tree_of_branch(reference)
        } else {
            self.tree_of_commit(reference)
        }
    }

    /// Commit `files` on top of `branch` directly, bypassing the API surface
    fn commit_direct(&mut self, branch: &str, message: &str, files: Vec<(String, String)>) -> String {
        let parent = self.refs.get(branch).cloned();
        let mut entries = self.tree_of_branch(branch).cloned().unwrap_or_default();
        for (path, content) in files {
            let blob = self.put_blob(content.into_bytes());
            entries.insert(path, blob);
        }
        let tree = self.put_tree(entries);
        let sha = self.put_commit(message, &tree, parent.as_deref());
        self.refs.insert(branch.to_string(), sha.clone());
        sha
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        let mut cursor = Some(descendant.to_string());
        while let Some(sha) = cursor {
            if sha == ancestor {
                return true;
            }
            cursor = self
                .commits
                .get(&sha)
                .and_then(|c| c.parents.first().cloned());
        }
        false
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            default_branch: "main".to_string(),
            state: Mutex::new(GraphState::default()),
        }
    }

    /// Make the next call of `op` fail with a 500
    pub fn fail_once(&self, op: &'static str) {
        self.state.lock().failures.push(op);
    }

    /// Have a competing writer commit `files` right before the next ref update
    pub fn race_next_update(&self, files: &[(&str, &str)]) {
        self.state.lock().racer = Some(
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        );
    }

    /// Have a competing writer commit `files` onto the default branch right
    /// after the next content read
    pub fn race_next_read(&self, files: &[(&str, &str)]) {
        self.state.lock().read_racer = Some(
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        );
    }

    /// Commit files straight onto a branch
    pub fn seed(&self, branch: &str, files: &[(&str, &str)]) -> String {
        let files = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        self.state.lock().commit_direct(branch, "seed", files)
    }

    pub fn head(&self, branch: &str) -> Option<String> {
        self.state.lock().refs.get(branch).cloned()
    }

    pub fn commit_info(&self, sha: &str) -> Option<CommitInfo> {
        self.state.lock().commits.get(sha).cloned()
    }

    pub fn message(&self, sha: &str) -> Option<String> {
        self.state.lock().messages.get(sha).cloned()
    }

    pub fn file_at(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.state.lock();
        let blob = state.tree_of_branch(branch)?.get(path)?;
        state
            .blobs
            .get(blob)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn bytes_at(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let blob = state.tree_of_branch(branch)?.get(path)?;
        state.blobs.get(blob).cloned()
    }

    pub fn paths_at(&self, branch: &str) -> Vec<String> {
        self.state
            .lock()
            .tree_of_branch(branch)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().commits.len()
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state.lock().calls.get(op).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ObjectGraph for MemoryGraph {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn default_branch(&self) -> Result<String, StoreError> {
        self.state.lock().record_call("default_branch")?;
        Ok(self.default_branch.clone())
    }

    async fn get_head_ref(&self, branch: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock();
        state.record_call("get_head_ref")?;
        Ok(state.refs.get(branch).cloned())
    }

    async fn get_commit(&self, sha: &str) -> Result<CommitInfo, StoreError> {
        let mut state = self.state.lock();
        state.record_call("get_commit")?;
        state.commits.get(sha).cloned().ok_or_else(|| StoreError::Remote {
            context: "get_commit".into(),
            status: 404,
            body: format!("no commit {}", sha),
        })
    }

    async fn create_blob(&self, content: &str, encoding: BlobEncoding) -> Result<String, StoreError> {
        let mut state = self.state.lock();
        state.record_call("create_blob")?;
        let bytes = match encoding {
            BlobEncoding::Utf8 => content.as_bytes().to_vec(),
            BlobEncoding::Base64 => BASE64
                .decode(content)
                .map_err(|e| StoreError::Invalid(e.to_string()))?,
        };
        Ok(state.put_blob(bytes))
    }

    async fn create_tree(&self, base_tree: Option<&str>, entries: &[TreeEntry]) -> Result<String, StoreError> {
        let mut state = self.state.lock();
        state.record_call("create_tree")?;
        let mut tree = match base_tree {
            Some(base) => state.trees.get(base).cloned().ok_or_else(|| StoreError::Remote {
                context: "create_tree".into(),
                status: 422,
                body: format!("base tree {} not found", base),
            })?,
            None => BTreeMap::new(),
        };
        for entry in entries {
            match &entry.blob {
                Some(blob) if state.blobs.contains_key(blob) => {
                    tree.insert(entry.path.clone(), blob.clone());
                }
                Some(blob) => {
                    return Err(StoreError::Remote {
                        context: "create_tree".into(),
                        status: 422,
                        body: format!("blob {} not found", blob),
                    });
                }
                None => {
                    tree.remove(&entry.path);
                }
            }
        }
        Ok(state.put_tree(tree))
    }

    async fn create_commit(&self, message: &str, tree: &str, parent: Option<&str>) -> Result<String, StoreError> {
        let mut state = self.state.lock();
        state.record_call("create_commit")?;
        if !state.trees.contains_key(tree) {
            return Err(StoreError::Remote {
                context: "create_commit".into(),
                status: 422,
                body: format!("tree {} not found", tree),
            });
        }
        Ok(state.put_commit(message, tree, parent))
    }

    async fn update_ref(&self, branch: &str, sha: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.record_call("update_ref")?;
        if let Some(files) = state.racer.take() {
            state.commit_direct(branch, "competing writer", files);
        }
        let current = state.refs.get(branch).cloned().ok_or_else(|| {
            StoreError::Conflict(format!("branch {} does not exist", branch))
        })?;
        if !state.is_ancestor(&current, sha) {
            return Err(StoreError::Conflict(format!(
                "branch {} moved, update to {} is not a fast forward",
                branch, sha
            )));
        }
        state.refs.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.record_call("create_ref")?;
        if let Some(files) = state.racer.take() {
            state.commit_direct(branch, "competing writer", files);
        }
        if state.refs.contains_key(branch) {
            return Err(StoreError::Conflict(format!("branch {} already exists", branch)));
        }
        state.refs.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn get_content(&self, path: &str, reference: Option<&str>) -> Result<Option<Vec<u8>>, StoreError> {
        let mut state = self.state.lock();
        state.record_call("get_content")?;
        let reference = reference.unwrap_or(&self.default_branch);
        let content = state
            .tree_at(reference)
            .and_then(|tree| tree.get(path))
            .and_then(|blob| state.blobs.get(blob))
            .cloned();
        if let Some(files) = state.read_racer.take() {
            let branch = self.default_branch.clone();
            state.commit_direct(&branch, "competing writer", files);
        }
        Ok(content)
    }
}
