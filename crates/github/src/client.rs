//! Repository-scoped GitHub REST client.

use async_trait::async_trait;
use pipeline::{
    AccessToken, BranchName, CommitSha, CommitState, MergeableState, NewPullRequest, Owner,
    PullRequest, PullRequestNumber, RepositoryName, SourceControl, SourceControlError,
};
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Media type GitHub recommends for REST v3.
const ACCEPT: &str = "application/vnd.github+json";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct StatusBody<'a> {
    state: &'a str,
    description: &'a str,
    context: &'a str,
}

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct MergeBody<'a> {
    base: &'a str,
    head: &'a str,
}

#[derive(Debug, Deserialize)]
struct MergeCommit {
    sha: String,
}

#[derive(Debug, Serialize)]
struct MergePullRequestBody<'a> {
    commit_message: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePullRequestBody<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct LabelsBody<'a> {
    labels: &'a [String],
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    number: u64,
    head: RefPayload,
    base: RefPayload,
    #[serde(default)]
    mergeable_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefPayload {
    #[serde(rename = "ref")]
    name: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPullRequest {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

impl PullRequestPayload {
    fn into_domain(self) -> Result<PullRequest, SourceControlError> {
        let invalid = |field: &str| SourceControlError::InvalidResponse {
            operation: "get pull request",
            message: format!("empty {field}"),
        };
        Ok(PullRequest {
            number: PullRequestNumber::new(self.number),
            head_ref: BranchName::new(self.head.name).ok_or_else(|| invalid("head.ref"))?,
            head_sha: CommitSha::new(self.head.sha).ok_or_else(|| invalid("head.sha"))?,
            base_ref: BranchName::new(self.base.name).ok_or_else(|| invalid("base.ref"))?,
            base_sha: CommitSha::new(self.base.sha).ok_or_else(|| invalid("base.sha"))?,
            mergeable_state: MergeableState::from_api(self.mergeable_state.as_deref()),
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// GitHub client bound to one repository.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_root: String,
    owner: Owner,
    repository: RepositoryName,
    token: AccessToken,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_root", &self.api_root)
            .field("owner", &self.owner)
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Creates a client for `owner/repository` under `api_root`.
    pub fn new(
        http: reqwest::Client,
        api_root: impl Into<String>,
        owner: Owner,
        repository: RepositoryName,
        token: AccessToken,
    ) -> Self {
        Self {
            http,
            api_root: api_root.into(),
            owner,
            repository,
            token,
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{path}",
            self.api_root.trim_end_matches('/'),
            self.owner,
            self.repository
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.repo_url(path))
            .bearer_auth(self.token.expose())
            .header(header::ACCEPT, ACCEPT)
    }

    /// Sends `request`, turning transport failures and non-2xx statuses into
    /// errors.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, SourceControlError> {
        let response = request
            .send()
            .await
            .map_err(|err| SourceControlError::Transport {
                operation,
                message: err.to_string(),
            })?;

        let status = response.status();
        debug!(operation, status = status.as_u16(), "github response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorPayload>(&body)
            .map(|payload| payload.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        Err(SourceControlError::Api {
            operation,
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> Result<T, SourceControlError> {
        response
            .json::<T>()
            .await
            .map_err(|err| SourceControlError::InvalidResponse {
                operation,
                message: err.to_string(),
            })
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    #[instrument(skip_all, fields(sha = %sha, state = %state, context = %context))]
    async fn create_status(
        &self,
        sha: &CommitSha,
        state: CommitState,
        description: &str,
        context: &str,
    ) -> Result<(), SourceControlError> {
        let body = StatusBody {
            state: state.as_str(),
            description,
            context,
        };
        self.send(
            "create status",
            self.request(Method::POST, &format!("statuses/{sha}")).json(&body),
        )
        .await
        .map(drop)
    }

    #[instrument(skip_all, fields(pr = %number))]
    async fn create_comment(
        &self,
        number: PullRequestNumber,
        body: &str,
    ) -> Result<(), SourceControlError> {
        let path = format!("issues/{}/comments", number.as_u64());
        self.send(
            "create comment",
            self.request(Method::POST, &path).json(&CommentBody { body }),
        )
        .await
        .map(drop)
    }

    #[instrument(skip_all, fields(base = %base, head = %head))]
    async fn merge_branch(
        &self,
        base: &BranchName,
        head: &BranchName,
    ) -> Result<Option<CommitSha>, SourceControlError> {
        let body = MergeBody {
            base: base.as_str(),
            head: head.as_str(),
        };
        let response = self
            .send("merge", self.request(Method::POST, "merges").json(&body))
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let commit: MergeCommit = Self::decode("merge", response).await?;
        CommitSha::new(commit.sha)
            .map(Some)
            .ok_or_else(|| SourceControlError::InvalidResponse {
                operation: "merge",
                message: "empty merge commit sha".to_string(),
            })
    }

    #[instrument(skip_all, fields(pr = %number))]
    async fn merge_pull_request(
        &self,
        number: PullRequestNumber,
        message: &str,
    ) -> Result<(), SourceControlError> {
        let path = format!("pulls/{}/merge", number.as_u64());
        let body = MergePullRequestBody {
            commit_message: message,
        };
        self.send(
            "merge pull request",
            self.request(Method::PUT, &path).json(&body),
        )
        .await
        .map(drop)
    }

    #[instrument(skip_all, fields(branch = %branch))]
    async fn delete_ref(&self, branch: &BranchName) -> Result<(), SourceControlError> {
        let path = format!("git/refs/heads/{branch}");
        self.send("delete ref", self.request(Method::DELETE, &path))
            .await
            .map(drop)
    }

    #[instrument(skip_all, fields(pr = %number))]
    async fn get_pull_request(
        &self,
        number: PullRequestNumber,
    ) -> Result<PullRequest, SourceControlError> {
        let path = format!("pulls/{}", number.as_u64());
        let response = self
            .send("get pull request", self.request(Method::GET, &path))
            .await?;
        let payload: PullRequestPayload = Self::decode("get pull request", response).await?;
        payload.into_domain()
    }

    #[instrument(skip_all, fields(head = %pull_request.head, base = %pull_request.base))]
    async fn create_pull_request(
        &self,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequestNumber, SourceControlError> {
        let body = CreatePullRequestBody {
            title: &pull_request.title,
            head: pull_request.head.as_str(),
            base: pull_request.base.as_str(),
            body: &pull_request.body,
        };
        let response = self
            .send(
                "create pull request",
                self.request(Method::POST, "pulls").json(&body),
            )
            .await?;
        let created: CreatedPullRequest = Self::decode("create pull request", response).await?;
        Ok(PullRequestNumber::new(created.number))
    }

    #[instrument(skip_all, fields(pr = %number))]
    async fn add_labels(
        &self,
        number: PullRequestNumber,
        labels: &[String],
    ) -> Result<(), SourceControlError> {
        let path = format!("issues/{}/labels", number.as_u64());
        self.send(
            "add labels",
            self.request(Method::POST, &path).json(&LabelsBody { labels }),
        )
        .await
        .map(drop)
    }
}
