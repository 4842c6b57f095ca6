//! Minimal GitHub REST client for deployments and check runs.

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DeployError, Result};

pub const GITHUB_API: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";

/// Largest page size the check-runs endpoint accepts.
const CHECK_RUNS_PER_PAGE: u32 = 100;

/// Task name recorded on deployments created by this tool.
pub const DEPLOY_TASK: &str = "deploy";

/// One check run attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    /// `queued`, `in_progress` or `completed`
    pub status: String,
    pub conclusion: Option<String>,
}

/// Check runs collected for a commit with the total GitHub reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CheckRunList {
    #[serde(default)]
    pub total_count: u64,
    pub check_runs: Vec<CheckRun>,
}

impl CheckRunList {
    /// Every run GitHub counted was fetched.
    pub fn is_complete(&self) -> bool {
        self.check_runs.len() as u64 >= self.total_count
    }
}

/// A deployment record as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Deployment {
    pub id: u64,
    #[serde(default)]
    pub environment: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /repos/{owner}/{repo}/deployments`.
#[derive(Debug, Clone, Serialize)]
pub struct NewDeployment {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub task: String,
    pub environment: String,
    pub production_environment: bool,
    pub auto_merge: bool,
    pub required_contexts: Vec<String>,
    pub description: String,
}

/// Record states accepted by the statuses endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    Pending,
    Success,
    /// Sent as `failure`
    #[serde(rename = "failure")]
    Failed,
    Inactive,
}

impl DeploymentState {
    /// `None` is in progress, `Some(true)` success, `Some(false)` failure.
    pub fn from_outcome(outcome: Option<bool>) -> Self {
        match outcome {
            None => DeploymentState::Pending,
            Some(true) => DeploymentState::Success,
            Some(false) => DeploymentState::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeploymentState::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::Pending => "pending",
            DeploymentState::Success => "success",
            DeploymentState::Failed => "failure",
            DeploymentState::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Serialize)]
struct NewStatus<'a> {
    state: DeploymentState,
    #[serde(skip_serializing_if = "is_blank")]
    environment: &'a str,
    description: &'a str,
}

fn is_blank(value: &&str) -> bool {
    value.is_empty()
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Client scoped to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(token: &str, owner: &str, repo: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );

        let http = reqwest::Client::builder()
            .user_agent(concat!("deploy/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: GITHUB_API.to_string(),
            token: token.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Point the client at another API root (GitHub Enterprise, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/repos/{}/{}{}",
            self.base_url, self.owner, self.repo, path
        );
        debug!(%method, %url, "github request");
        self.http.request(method, url).bearer_auth(&self.token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|err| err.message)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body
                }
            });
        Err(DeployError::release(Some(status.as_u16()), message))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.send(request).await?.json().await?)
    }

    /// `GET /repos/{owner}/{repo}/commits/{sha}/check-runs`, following pages
    /// until every counted run has been read.
    pub async fn check_runs(&self, sha: &str) -> Result<CheckRunList> {
        let path = format!("/commits/{}/check-runs", sha);
        let mut listing = CheckRunList::default();
        for page in 1u32.. {
            let request = self
                .request(Method::GET, &path)
                .query(&[("per_page", CHECK_RUNS_PER_PAGE), ("page", page)]);
            let batch: CheckRunList = self.send_json(request).await?;
            let fetched = batch.check_runs.len();
            listing.total_count = listing.total_count.max(batch.total_count);
            listing.check_runs.extend(batch.check_runs);

            if fetched < CHECK_RUNS_PER_PAGE as usize || listing.is_complete() {
                break;
            }
        }
        debug!(
            sha,
            fetched = listing.check_runs.len(),
            total = listing.total_count,
            "collected check runs"
        );
        Ok(listing)
    }

    /// `GET /repos/{owner}/{repo}/deployments` filtered by commit and environment.
    pub async fn list_deployments(&self, sha: &str, environment: &str) -> Result<Vec<Deployment>> {
        let request = self.request(Method::GET, "/deployments").query(&[
            ("sha", sha),
            ("task", DEPLOY_TASK),
            ("environment", environment),
        ]);
        self.send_json(request).await
    }

    /// `POST /repos/{owner}/{repo}/deployments`
    pub async fn create_deployment(&self, deployment: &NewDeployment) -> Result<Deployment> {
        let request = self.request(Method::POST, "/deployments").json(deployment);
        self.send_json(request).await
    }

    /// `POST /repos/{owner}/{repo}/deployments/{id}/statuses`
    pub async fn create_status(
        &self,
        id: u64,
        state: DeploymentState,
        environment: &str,
        description: &str,
    ) -> Result<()> {
        let request = self
            .request(Method::POST, &format!("/deployments/{}/statuses", id))
            .json(&NewStatus {
                state,
                environment,
                description,
            });
        self.send(request).await.map(|_| ())
    }

    /// `DELETE /repos/{owner}/{repo}/deployments/{id}`
    pub async fn delete_deployment(&self, id: u64) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("/deployments/{}", id));
        self.send(request).await.map(|_| ())
    }
}
