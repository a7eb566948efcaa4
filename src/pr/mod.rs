pub mod auth;
pub mod types;

pub use auth::AppCredentials;
pub use types::PullRequestEvent;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument};

const USER_AGENT: &str = "pr-review-bot";
const API_VERSION: &str = "2022-11-28";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.diff";

#[derive(Debug, Error)]
pub enum HostError {
    #[error("GitHub API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("GitHub App authentication failed: {0}")]
    Auth(String),

    #[error("Webhook delivery carried no installation id")]
    MissingInstallation,
}

impl HostError {
    /// HTTP status of the failed call, when there was a response at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            HostError::Api { status, .. } => Some(*status),
            HostError::Request(e) => e.status().map(|s| s.as_u16()),
            HostError::Auth(_) | HostError::MissingInstallation => None,
        }
    }
}

/// The repository-hosting side of the review pipeline.
#[async_trait]
pub trait PullRequestHost: Send + Sync {
    /// Fetch the unified diff of the pull request as opaque text.
    async fn fetch_diff(&self, pr: &PullRequestEvent) -> Result<String, HostError>;

    /// Post `body` as a new comment on the pull request's issue thread.
    async fn post_comment(&self, pr: &PullRequestEvent, body: &str) -> Result<(), HostError>;
}

/// GitHub REST client acting as a GitHub App installation.
pub struct GitHubApp {
    client: Client,
    api_base: String,
    credentials: AppCredentials,
}

#[derive(Deserialize)]
struct InstallationToken {
    token: String,
}

#[derive(Deserialize)]
struct GitHubErrorBody {
    message: String,
}

impl GitHubApp {
    pub fn new(credentials: AppCredentials, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(token)
    }

    fn pull_url(&self, pr: &PullRequestEvent) -> String {
        format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_base, pr.owner, pr.repo, pr.number
        )
    }

    fn issue_comments_url(&self, pr: &PullRequestEvent) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_base, pr.owner, pr.repo, pr.number
        )
    }

    /// Exchange an app JWT for an installation access token.
    #[instrument(skip(self))]
    async fn installation_token(&self, installation_id: Option<u64>) -> Result<String, HostError> {
        let installation_id = installation_id.ok_or(HostError::MissingInstallation)?;
        let jwt = self.credentials.jwt()?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base, installation_id
        );

        debug!("requesting installation token");
        let response = self
            .request(Method::POST, &url, &jwt)
            .header("Accept", JSON_MEDIA_TYPE)
            .send()
            .await?;
        let token = check_status(response).await?.json::<InstallationToken>().await?;
        Ok(token.token)
    }
}

#[async_trait]
impl PullRequestHost for GitHubApp {
    #[instrument(skip(self), fields(pr = %pr))]
    async fn fetch_diff(&self, pr: &PullRequestEvent) -> Result<String, HostError> {
        let token = self.installation_token(pr.installation_id).await?;

        debug!("fetching PR diff from GitHub API");
        let response = self
            .request(Method::GET, &self.pull_url(pr), &token)
            .header("Accept", DIFF_MEDIA_TYPE)
            .send()
            .await?;
        let diff = check_status(response).await?.text().await?;
        debug!(diff_bytes = diff.len(), "received PR diff");
        Ok(diff)
    }

    #[instrument(skip(self, body), fields(pr = %pr, body_bytes = body.len()))]
    async fn post_comment(&self, pr: &PullRequestEvent, body: &str) -> Result<(), HostError> {
        let token = self.installation_token(pr.installation_id).await?;

        debug!("posting issue comment");
        let response = self
            .request(Method::POST, &self.issue_comments_url(pr), &token)
            .header("Accept", JSON_MEDIA_TYPE)
            .json(&json!({ "body": body }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Turn a non-2xx reply into `HostError::Api`, preferring GitHub's own
/// `message` field over the raw body.
async fn check_status(response: Response) -> Result<Response, HostError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GitHubErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(HostError::Api {
        status: status.as_u16(),
        message,
    })
}
