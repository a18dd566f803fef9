use std::env;
use std::fmt;
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_PORT: u16 = 9110;
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Credentials and coordinates of the backing repository.
#[derive(Clone)]
pub struct GithubSettings {
    pub owner: String,
    pub name: String,
    pub token: String,
    pub api_url: String,
}

impl GithubSettings {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Debug for GithubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubSettings")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Which persistence layer requests are routed to.
#[derive(Clone, Debug)]
pub enum RemoteConfig {
    Configured(GithubSettings),
    /// No credentials: the in-memory fallback store serves requests
    Absent,
    /// Credentials present but unusable; every request fails with this message
    Invalid(String),
}

#[derive(Clone, Debug)]
pub struct StoreSettings {
    /// Explicit branch, otherwise the repository default is resolved per commit
    pub branch: Option<String>,
    pub retry: RetryPolicy,
    pub conflict_retries: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            branch: None,
            retry: RetryPolicy::default(),
            conflict_retries: 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub remote: RemoteConfig,
    pub store: StoreSettings,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let remote = match (var("GITHUB_REPO"), var("GITHUB_TOKEN")) {
            (Some(repo), Some(token)) => match parse_repo(&repo) {
                Ok((owner, name)) => RemoteConfig::Configured(GithubSettings {
                    owner,
                    name,
                    token,
                    api_url: var("GITHUB_API_URL")
                        .map(|u| u.trim_end_matches('/').to_string())
                        .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                }),
                Err(e) => RemoteConfig::Invalid(e),
            },
            (Some(_), None) => {
                log::warn!("GITHUB_REPO is set but GITHUB_TOKEN is not; using the in-memory fallback store");
                RemoteConfig::Absent
            }
            (None, Some(_)) => {
                log::warn!("GITHUB_TOKEN is set but GITHUB_REPO is not; using the in-memory fallback store");
                RemoteConfig::Absent
            }
            (None, None) => RemoteConfig::Absent,
        };

        let defaults = StoreSettings::default();
        let parsed = |key: &str| var(key).and_then(|s| s.parse::<u64>().ok());

        Self {
            port: var("GITVAULT_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            remote,
            store: StoreSettings {
                branch: var("GITHUB_BRANCH"),
                retry: RetryPolicy {
                    max_attempts: parsed("GITVAULT_READ_RETRIES")
                        .map(|n| n as u32)
                        .unwrap_or(defaults.retry.max_attempts),
                    base_delay: parsed("GITVAULT_RETRY_BASE_MS")
                        .map(Duration::from_millis)
                        .unwrap_or(defaults.retry.base_delay),
                },
                conflict_retries: parsed("GITVAULT_CONFLICT_RETRIES")
                    .map(|n| n as u32)
                    .unwrap_or(defaults.conflict_retries),
            },
        }
    }
}

/// Split `owner/name`, rejecting anything else.
pub fn parse_repo(input: &str) -> Result<(String, String), String> {
    let mut parts = input.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.trim().is_empty() && !name.trim().is_empty() => {
            Ok((owner.trim().to_string(), name.trim().to_string()))
        }
        _ => Err(format!("GITHUB_REPO must be in the form owner/name, got '{}'", input)),
    }
}
