use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use log::debug;
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};
use ttt_server_domain::{ServiceError, ServiceResult, mirror::RemoteMirror};

const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "ttt-server";

#[derive(Clone, Debug)]
pub struct GithubConfig {
    pub api_url: String,
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    pub token: String,
    /// Directory inside the repository the documents are written to.
    pub path_prefix: String,
}

impl GithubConfig {
    /// `None` unless both `TTT_GITHUB_REPO` and `TTT_GITHUB_TOKEN` are set.
    pub fn from_env() -> Option<Self> {
        let repo = std::env::var("TTT_GITHUB_REPO").ok().filter(|v| !v.is_empty())?;
        let token = std::env::var("TTT_GITHUB_TOKEN").ok().filter(|v| !v.is_empty())?;
        Some(Self {
            api_url: std::env::var("TTT_GITHUB_API_URL").unwrap_or(DEFAULT_API_URL.to_string()),
            repo,
            branch: std::env::var("TTT_GITHUB_BRANCH").unwrap_or("main".to_string()),
            token,
            path_prefix: std::env::var("TTT_GITHUB_PATH_PREFIX").unwrap_or_default(),
        })
    }
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
}

#[derive(Serialize, Debug, PartialEq)]
struct UpdateContentsRequest {
    message: String,
    content: String,
    branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

/// Writes documents to a GitHub repository through the contents API.
pub struct GithubRemoteMirror {
    client: reqwest::Client,
    config: GithubConfig,
}

impl GithubRemoteMirror {
    pub fn new(config: GithubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn remote_path(&self, path: &str) -> String {
        let prefix = self.config.path_prefix.trim_matches('/');
        if prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", prefix, path)
        }
    }

    fn contents_url(&self, remote_path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.repo,
            remote_path
        )
    }

    fn update_request(
        &self,
        remote_path: &str,
        contents: &str,
        sha: Option<String>,
    ) -> UpdateContentsRequest {
        UpdateContentsRequest {
            message: format!("Update {}", remote_path),
            content: BASE64.encode(contents.as_bytes()),
            branch: self.config.branch.clone(),
            sha,
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.config.token)
    }

    async fn current_sha(&self, remote_path: &str) -> ServiceResult<Option<String>> {
        let resp = self
            .request(reqwest::Method::GET, &self.contents_url(remote_path))
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let contents: ContentsResponse = resp
                    .json()
                    .await
                    .map_err(|e| ServiceError::Internal(e.to_string()))?;
                Ok(Some(contents.sha))
            }
            status => ServiceError::internal(format!(
                "GitHub returned {} reading {}",
                status, remote_path
            )),
        }
    }
}

#[async_trait::async_trait]
impl RemoteMirror for GithubRemoteMirror {
    async fn push(&self, path: &str, contents: &str) -> ServiceResult<()> {
        let remote_path = self.remote_path(path);
        let sha = self.current_sha(&remote_path).await?;
        debug!(
            "Pushing {} to {} ({})",
            remote_path,
            self.config.repo,
            if sha.is_some() { "update" } else { "create" }
        );

        let body = self.update_request(&remote_path, contents, sha);
        let resp = self
            .request(reqwest::Method::PUT, &self.contents_url(&remote_path))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return ServiceError::internal(format!(
                "GitHub returned {} writing {}: {}",
                status, remote_path, text
            ));
        }
        Ok(())
    }
}
