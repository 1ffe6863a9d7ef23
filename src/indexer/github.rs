//! GitHub repository as a file source
//!
//! Two REST calls are needed: a recursive tree listing and raw content downloads.
//! The default branch is found by probing `main`, then `master`.

use crate::provider::{http_client, parse_api_error};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_RAW_URL: &str = "https://raw.githubusercontent.com";

/// Branch names probed in order
pub const DEFAULT_BRANCH_CANDIDATES: &[&str] = &["main", "master"];

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("Invalid GitHub repository '{0}'. Expected owner/repo or https://github.com/owner/repo")]
    InvalidReference(String),
    #[error("Could not find branch main or master in {owner}/{repo}")]
    BranchNotFound { owner: String, repo: String },
    #[error("GitHub API error for {repo}: {message}")]
    Api { repo: String, message: String },
    #[error("Network error while contacting GitHub for {repo}: {message}")]
    Network { repo: String, message: String },
}

/// Parsed `owner/repo` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Accepts `owner/repo` or a github.com URL, with or without `.git`,
    /// a trailing slash, or a deeper `/tree/<branch>/...` suffix.
    pub fn parse(input: &str) -> Result<Self, GitHubError> {
        let trimmed = input.trim();
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        let without_host = without_scheme
            .strip_prefix("www.github.com/")
            .or_else(|| without_scheme.strip_prefix("github.com/"))
            .unwrap_or(without_scheme);

        let mut parts = without_host.split('/').filter(|p| !p.is_empty());
        let owner = parts.next();
        let repo = parts.next().map(|r| r.trim_end_matches(".git"));

        match (owner, repo) {
            (Some(owner), Some(repo)) if is_valid_name(owner) && is_valid_name(repo) => Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(GitHubError::InvalidReference(trimmed.to_string())),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// One entry of a recursive git tree listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

/// Remote repository access
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Full recursive tree of `branch`, `None` when the branch does not exist
    async fn fetch_tree(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> Result<Option<Vec<TreeEntry>>, GitHubError>;

    /// Raw text of one file
    async fn fetch_file(&self, repo: &RepoRef, branch: &str, path: &str)
        -> Result<String, GitHubError>;
}

/// Probe the conventional default branches.
///
/// A missing branch is not an error until every candidate has been tried.
pub async fn resolve_default_branch(
    source: &dyn RepoSource,
    repo: &RepoRef,
) -> Result<(String, Vec<TreeEntry>), GitHubError> {
    for branch in DEFAULT_BRANCH_CANDIDATES {
        match source.fetch_tree(repo, branch).await? {
            Some(tree) => return Ok((branch.to_string(), tree)),
            None => log::info!("[GitHub] Branch {} not found in {}", branch, repo),
        }
    }
    Err(GitHubError::BranchNotFound {
        owner: repo.owner.clone(),
        repo: repo.repo.clone(),
    })
}

/// REST client for github.com
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    raw_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new() -> Self {
        Self {
            client: http_client(),
            api_url: GITHUB_API_URL.to_string(),
            raw_url: GITHUB_RAW_URL.to_string(),
            token: None,
        }
    }

    /// Authenticate requests to lift the anonymous rate limit
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn with_base_urls(mut self, api_url: impl Into<String>, raw_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.raw_url = raw_url.into();
        self
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepoSource for GitHubClient {
    async fn fetch_tree(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> Result<Option<Vec<TreeEntry>>, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_url.trim_end_matches('/'),
            repo.owner,
            repo.repo,
            branch
        );

        let response = self
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| network_error(repo, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api {
                repo: repo.to_string(),
                message: parse_api_error(status.as_u16(), &body, "GitHub API Error"),
            });
        }

        let parsed: TreeResponse = response.json().await.map_err(|e| GitHubError::Api {
            repo: repo.to_string(),
            message: format!("unreadable tree listing: {}", e),
        })?;
        if parsed.truncated {
            log::warn!(
                "[GitHub] Tree listing for {} was truncated; some files will be missing",
                repo
            );
        }
        Ok(Some(parsed.tree))
    }

    async fn fetch_file(
        &self,
        repo: &RepoRef,
        branch: &str,
        path: &str,
    ) -> Result<String, GitHubError> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_url.trim_end_matches('/'),
            repo.owner,
            repo.repo,
            branch,
            path
        );

        let response = self
            .get(&url)
            .send()
            .await
            .map_err(|e| network_error(repo, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GitHubError::Api {
                repo: repo.to_string(),
                message: format!("Fetch Error ({}) for {}", status.as_u16(), path),
            });
        }

        response.text().await.map_err(|e| network_error(repo, e))
    }
}

fn network_error(repo: &RepoRef, e: reqwest::Error) -> GitHubError {
    GitHubError::Network {
        repo: repo.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Repository double: branch -> (path -> content)
    #[derive(Default)]
    pub(crate) struct FakeRepo {
        pub branches: HashMap<String, Vec<(String, String)>>,
        pub tree_calls: Mutex<Vec<String>>,
        pub failing_paths: Vec<String>,
    }

    impl FakeRepo {
        pub fn with_branch(mut self, branch: &str, files: &[(&str, &str)]) -> Self {
            self.branches.insert(
                branch.to_string(),
                files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.to_string()))
                    .collect(),
            );
            self
        }
    }

    #[async_trait]
    impl RepoSource for FakeRepo {
        async fn fetch_tree(
            &self,
            _repo: &RepoRef,
            branch: &str,
        ) -> Result<Option<Vec<TreeEntry>>, GitHubError> {
            self.tree_calls.lock().unwrap().push(branch.to_string());
            Ok(self.branches.get(branch).map(|files| {
                let mut entries: Vec<TreeEntry> = files
                    .iter()
                    .map(|(path, _)| TreeEntry {
                        path: path.clone(),
                        kind: "blob".to_string(),
                    })
                    .collect();
                entries.push(TreeEntry {
                    path: "src".to_string(),
                    kind: "tree".to_string(),
                });
                entries
            }))
        }

        async fn fetch_file(
            &self,
            repo: &RepoRef,
            branch: &str,
            path: &str,
        ) -> Result<String, GitHubError> {
            if self.failing_paths.iter().any(|p| p == path) {
                return Err(GitHubError::Api {
                    repo: repo.to_string(),
                    message: "Fetch Error (500)".to_string(),
                });
            }
            self.branches
                .get(branch)
                .and_then(|files| files.iter().find(|(p, _)| p == path))
                .map(|(_, c)| c.clone())
                .ok_or_else(|| GitHubError::Api {
                    repo: repo.to_string(),
                    message: "Fetch Error (404)".to_string(),
                })
        }
    }

    #[test]
    fn test_parse_repo_reference_forms() {
        let expected = RepoRef {
            owner: "rust-lang".to_string(),
            repo: "rustlings".to_string(),
        };
        for input in [
            "rust-lang/rustlings",
            "https://github.com/rust-lang/rustlings",
            "http://github.com/rust-lang/rustlings/",
            "github.com/rust-lang/rustlings.git",
            "https://github.com/rust-lang/rustlings/tree/main/exercises",
        ] {
            assert_eq!(RepoRef::parse(input).unwrap(), expected, "{}", input);
        }
    }

    #[test]
    fn test_invalid_reference_echoes_input() {
        let err = RepoRef::parse("https://github.com/only-owner").unwrap_err();
        assert!(err.to_string().contains("https://github.com/only-owner"));
        assert!(RepoRef::parse("owner/re po").is_err());
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_master() {
        let fake = FakeRepo::default().with_branch("master", &[("README.md", "# hi")]);
        let repo = RepoRef::parse("acme/widgets").unwrap();

        let (branch, tree) = resolve_default_branch(&fake, &repo).await.unwrap();
        assert_eq!(branch, "master");
        assert_eq!(tree.iter().filter(|e| e.is_blob()).count(), 1);
        assert_eq!(*fake.tree_calls.lock().unwrap(), vec!["main", "master"]);
    }

    #[tokio::test]
    async fn test_resolve_prefers_main() {
        let fake = FakeRepo::default()
            .with_branch("main", &[("a.rs", "fn a() {}")])
            .with_branch("master", &[]);
        let repo = RepoRef::parse("acme/widgets").unwrap();

        let (branch, _) = resolve_default_branch(&fake, &repo).await.unwrap();
        assert_eq!(branch, "main");
        assert_eq!(fake.tree_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_branches_name_the_repo() {
        let fake = FakeRepo::default();
        let repo = RepoRef::parse("acme/widgets").unwrap();

        let err = resolve_default_branch(&fake, &repo).await.unwrap_err();
        assert!(matches!(err, GitHubError::BranchNotFound { .. }));
        assert!(err.to_string().contains("acme/widgets"));
    }

    #[test]
    fn test_tree_response_parsing() {
        let parsed: TreeResponse = serde_json::from_str(
            r#"{"sha": "x", "tree": [{"path": "src/lib.rs", "type": "blob", "mode": "100644"},
                                     {"path": "src", "type": "tree"}], "truncated": false}"#,
        )
        .unwrap();
        assert_eq!(parsed.tree.len(), 2);
        assert!(parsed.tree[0].is_blob());
        assert!(!parsed.tree[1].is_blob());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = GitHubClient::new()
            .with_token("  ")
            .with_base_urls("http://127.0.0.1:9/", "http://127.0.0.1:9");
        let repo = RepoRef::parse("acme/widgets").unwrap();

        let err = client.fetch_tree(&repo, "main").await.unwrap_err();
        assert!(matches!(err, GitHubError::Network { .. }));
        assert!(err.to_string().contains("acme/widgets"));

        let err = client
            .fetch_file(&repo, "main", "src/lib.rs")
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubError::Network { .. }));
    }
}
