// Push the local CSV to a GitHub repository through the contents API
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub token: Option<String>,
    /// `owner/name`
    pub repo: Option<String>,
    /// Path of the file inside the repository
    pub file: Option<String>,
    pub api_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            repo: None,
            file: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl GithubConfig {
    /// Sync runs only when token, repository and file are all set.
    pub fn is_enabled(&self) -> bool {
        [&self.token, &self.repo, &self.file]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub status: u16,
    /// Whether the file already existed upstream
    pub updated: bool,
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: Option<String>,
}

pub struct GithubSync {
    client: reqwest::Client,
    token: String,
    contents_url: Url,
}

impl GithubSync {
    /// `None` when the configuration is incomplete.
    pub fn from_config(config: &GithubConfig) -> Result<Option<Self>> {
        if !config.is_enabled() {
            return Ok(None);
        }
        let (token, repo, file) = match (&config.token, &config.repo, &config.file) {
            (Some(t), Some(r), Some(f)) => (t.trim(), r.trim(), f.trim()),
            _ => return Ok(None),
        };

        let contents_url = contents_url(&config.api_base, repo, file)?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("moldrec/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Some(Self {
            client,
            token: token.to_string(),
            contents_url,
        }))
    }

    #[inline]
    pub fn contents_url(&self) -> &Url {
        &self.contents_url
    }

    async fn current_sha(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.contents_url.clone())
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .context("GitHub contents lookup failed")?;

        match response.status() {
            StatusCode::OK => {
                let body: ContentsResponse = response.json().await?;
                Ok(body.sha)
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                tracing::warn!(%status, "Unexpected status from GitHub contents lookup");
                Ok(None)
            }
        }
    }

    /// Replace the upstream file with `content`.
    pub async fn upload(&self, content: &[u8], message: &str) -> Result<SyncOutcome> {
        let sha = self.current_sha().await?;
        let body = put_body(content, message, sha.as_deref());

        let response = self
            .client
            .put(self.contents_url.clone())
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .context("GitHub contents upload failed")?;

        let status = response.status();
        tracing::info!(%status, url = %self.contents_url, "GitHub PUT finished");
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("GitHub PUT returned {}: {}", status, text));
        }

        Ok(SyncOutcome {
            status: status.as_u16(),
            updated: sha.is_some(),
        })
    }
}

/// `{api_base}/repos/{owner}/{name}/contents/{file}` with each segment
/// percent-encoded.
pub fn contents_url(api_base: &str, repo: &str, file: &str) -> Result<Url> {
    let mut url = Url::parse(api_base).with_context(|| format!("Invalid API base {:?}", api_base))?;
    let repo_parts: Vec<&str> = repo.split('/').filter(|s| !s.is_empty()).collect();
    if repo_parts.len() != 2 {
        return Err(anyhow!("Repository must look like owner/name, got {:?}", repo));
    }
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow!("API base {:?} cannot take a path", api_base))?;
        segments.pop_if_empty();
        segments.push("repos");
        segments.extend(repo_parts);
        segments.push("contents");
        segments.extend(file.split('/').filter(|s| !s.is_empty()));
    }
    Ok(url)
}

/// Request body for the contents PUT call.
pub fn put_body(content: &[u8], message: &str, sha: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "message": message,
        "content": base64::engine::general_purpose::STANDARD.encode(content),
    });
    if let Some(sha) = sha {
        body["sha"] = serde_json::Value::String(sha.to_string());
    }
    body
}
