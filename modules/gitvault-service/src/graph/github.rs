//! GitHub git data API client.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{BlobEncoding, CommitInfo, FILE_MODE, ObjectGraph, TreeEntry};
use crate::config::GithubSettings;
use crate::error::StoreError;

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";
const API_VERSION: &str = "2022-11-28";

pub struct GithubGraph {
    client: Client,
    settings: GithubSettings,
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: Option<String>,
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct RefInfo {
    object: ShaOnly,
}

#[derive(Deserialize)]
struct CommitPayload {
    sha: String,
    tree: ShaOnly,
    #[serde(default)]
    parents: Vec<ShaOnly>,
}

#[derive(Deserialize)]
struct ContentPayload {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

impl GithubGraph {
    pub fn new(client: Client, settings: GithubSettings) -> Self {
        Self { client, settings }
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.settings.api_url, self.settings.owner, self.settings.name, tail
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.request_as(method, url, ACCEPT_JSON)
    }

    fn request_as(&self, method: Method, url: &str, accept: &str) -> RequestBuilder {
        log::debug!("[GITHUB] {} {}", method, url);
        self.client
            .request(method, url)
            .bearer_auth(&self.settings.token)
            .header(reqwest::header::ACCEPT, accept)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send_json<T: DeserializeOwned>(&self, context: &str, request: RequestBuilder) -> Result<T, StoreError> {
        let response = ensure_success(context, request.send().await?).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Contents API URL for a repository path, each segment percent-encoded
    fn contents_url(&self, path: &str, reference: Option<&str>) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        let mut url = self.repo_url(&format!("/contents/{}", encoded.join("/")));
        if let Some(reference) = reference {
            url.push_str("?ref=");
            url.push_str(&urlencoding::encode(reference));
        }
        url
    }

    /// Files above the contents API inline limit come back with encoding
    /// `none`; fetch those through the raw media type.
    async fn get_raw(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        let response = self.request_as(Method::GET, url, ACCEPT_RAW).send().await?;
        let response = ensure_success("Get raw content", response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

async fn ensure_success(context: &str, response: Response) -> Result<Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Remote {
        context: context.to_string(),
        status,
        body,
    })
}

fn decode_base64(content: &str) -> Result<Vec<u8>, StoreError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact)
        .map_err(|e| StoreError::Invalid(format!("content is not valid base64: {}", e)))
}

#[async_trait]
impl ObjectGraph for GithubGraph {
    fn describe(&self) -> String {
        self.settings.full_name()
    }

    async fn default_branch(&self) -> Result<String, StoreError> {
        let info: RepoInfo = self
            .send_json("Get repo", self.request(Method::GET, &self.repo_url("")))
            .await?;
        Ok(info.default_branch.unwrap_or_else(|| "main".to_string()))
    }

    async fn get_head_ref(&self, branch: &str) -> Result<Option<String>, StoreError> {
        let url = self.repo_url(&format!("/git/ref/heads/{}", branch));
        let response = self.request(Method::GET, &url).send().await?;
        // 409 is what an entirely empty repository answers
        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::CONFLICT) {
            return Ok(None);
        }
        let response = ensure_success("Get ref", response).await?;
        let info: RefInfo = serde_json::from_str(&response.text().await?)?;
        Ok(Some(info.object.sha))
    }

    async fn get_commit(&self, sha: &str) -> Result<CommitInfo, StoreError> {
        let url = self.repo_url(&format!("/git/commits/{}", sha));
        let payload: CommitPayload = self
            .send_json("Get commit", self.request(Method::GET, &url))
            .await?;
        Ok(CommitInfo {
            sha: payload.sha,
            tree: payload.tree.sha,
            parents: payload.parents.into_iter().map(|p| p.sha).collect(),
        })
    }

    async fn create_blob(&self, content: &str, encoding: BlobEncoding) -> Result<String, StoreError> {
        let body = json!({ "content": content, "encoding": encoding.as_str() });
        let blob: ShaOnly = self
            .send_json(
                "Create blob",
                self.request(Method::POST, &self.repo_url("/git/blobs")).json(&body),
            )
            .await?;
        Ok(blob.sha)
    }

    async fn create_tree(&self, base_tree: Option<&str>, entries: &[TreeEntry]) -> Result<String, StoreError> {
        let tree: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| {
                json!({
                    "path": entry.path,
                    "mode": FILE_MODE,
                    "type": "blob",
                    "sha": entry.blob,
                })
            })
            .collect();
        let mut body = json!({ "tree": tree });
        if let Some(base) = base_tree {
            body["base_tree"] = json!(base);
        }
        let created: ShaOnly = self
            .send_json(
                "Create tree",
                self.request(Method::POST, &self.repo_url("/git/trees")).json(&body),
            )
            .await?;
        Ok(created.sha)
    }

    async fn create_commit(&self, message: &str, tree: &str, parent: Option<&str>) -> Result<String, StoreError> {
        let parents: Vec<&str> = parent.into_iter().collect();
        let body = json!({ "message": message, "tree": tree, "parents": parents });
        let created: ShaOnly = self
            .send_json(
                "Create commit",
                self.request(Method::POST, &self.repo_url("/git/commits")).json(&body),
            )
            .await?;
        Ok(created.sha)
    }

    async fn update_ref(&self, branch: &str, sha: &str) -> Result<(), StoreError> {
        let url = self.repo_url(&format!("/git/refs/heads/{}", branch));
        let response = self
            .request(Method::PATCH, &url)
            .json(&json!({ "sha": sha, "force": false }))
            .send()
            .await?;
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Conflict(format!(
                "branch {} moved, update to {} is not a fast forward: {}",
                branch, sha, body
            )));
        }
        ensure_success("Update ref", response).await?;
        Ok(())
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::POST, &self.repo_url("/git/refs"))
            .json(&json!({ "ref": format!("refs/heads/{}", branch), "sha": sha }))
            .send()
            .await?;
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Conflict(format!(
                "branch {} was created concurrently: {}",
                branch, body
            )));
        }
        ensure_success("Create ref", response).await?;
        Ok(())
    }

    async fn get_content(&self, path: &str, reference: Option<&str>) -> Result<Option<Vec<u8>>, StoreError> {
        let url = self.contents_url(path, reference);
        let response = self.request(Method::GET, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success("Get content", response).await?;
        let payload: ContentPayload = serde_json::from_str(&response.text().await?)?;
        match payload.encoding.as_str() {
            "base64" => decode_base64(&payload.content).map(Some),
            "none" => self.get_raw(&url).await.map(Some),
            _ => Ok(Some(payload.content.into_bytes())),
        }
    }
}
