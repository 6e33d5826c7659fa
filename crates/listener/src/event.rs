//! Webhook payloads and their classification.

use pipeline::{
    AccessToken, BranchName, CommitSha, DeploymentId, DeploymentRequest, Owner,
    PullRequestNumber, RepositoryName, RepositoryTarget, Timestamp,
};
use serde::Deserialize;

use crate::WebhookError;

/// A delivery, classified by its `X-GitHub-Event` header.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    /// `pull_request`.
    PullRequest(PullRequestEvent),
    /// `ping`, sent when the hook is created.
    Ping,
    /// Any other event name.
    Unsupported(String),
}

impl WebhookEvent {
    /// Decodes `body` according to `event`.
    pub fn parse(event: &str, body: &[u8]) -> Result<Self, WebhookError> {
        match event {
            "pull_request" => serde_json::from_slice(body)
                .map(Self::PullRequest)
                .map_err(|source| WebhookError::Malformed {
                    event: event.to_string(),
                    source,
                }),
            "ping" => Ok(Self::Ping),
            other => Ok(Self::Unsupported(other.to_string())),
        }
    }
}

/// What happened to the pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum PullRequestAction {
    Opened,
    Reopened,
    Synchronize,
    Other(String),
}

impl From<String> for PullRequestAction {
    fn from(action: String) -> Self {
        match action.as_str() {
            "opened" => Self::Opened,
            "reopened" => Self::Reopened,
            "synchronize" => Self::Synchronize,
            _ => Self::Other(action),
        }
    }
}

impl PullRequestAction {
    /// Whether the pull request's head has new content to deploy.
    pub fn triggers_deployment(&self) -> bool {
        matches!(self, Self::Opened | Self::Reopened | Self::Synchronize)
    }
}

/// The subset of a `pull_request` delivery the agent uses.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    pub number: u64,
    pub pull_request: PullRequestPayload,
    pub repository: RepositoryPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub head: RefPayload,
    pub base: RefPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefPayload {
    #[serde(rename = "ref")]
    pub name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    pub name: String,
    /// Repository API URL, e.g. `https://api.github.com/repos/org/repo`.
    pub url: String,
    pub clone_url: String,
    pub owner: OwnerPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerPayload {
    pub login: String,
}

impl PullRequestEvent {
    /// Builds the deployment request for this event, authenticating as `token`.
    pub fn to_request(&self, token: &AccessToken) -> Result<DeploymentRequest, WebhookError> {
        let repo = &self.repository;
        let pr = &self.pull_request;
        Ok(DeploymentRequest {
            id: DeploymentId::new_random(),
            received_at: Timestamp::now(),
            target: RepositoryTarget {
                api_url: repo.url.clone(),
                owner: Owner::new(repo.owner.login.as_str())
                    .ok_or(WebhookError::InvalidPayload("repository.owner.login"))?,
                repository: RepositoryName::new(repo.name.as_str())
                    .ok_or(WebhookError::InvalidPayload("repository.name"))?,
                token: token.clone(),
            },
            clone_url: repo.clone_url.clone(),
            number: PullRequestNumber::new(self.number),
            head_ref: BranchName::new(pr.head.name.as_str())
                .ok_or(WebhookError::InvalidPayload("pull_request.head.ref"))?,
            head_sha: CommitSha::new(pr.head.sha.as_str())
                .ok_or(WebhookError::InvalidPayload("pull_request.head.sha"))?,
            base_sha: CommitSha::new(pr.base.sha.as_str())
                .ok_or(WebhookError::InvalidPayload("pull_request.base.sha"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(action: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "action": action,
            "number": 3,
            "pull_request": {
                "head": {"ref": "deploy-abc", "sha": "headsha", "label": "org:deploy-abc"},
                "base": {"ref": "master", "sha": "basesha"}
            },
            "repository": {
                "name": "cluster",
                "url": "https://api.github.com/repos/org/cluster",
                "clone_url": "https://github.com/org/cluster.git",
                "owner": {"login": "org"}
            },
            "sender": {"login": "someone"}
        }))
        .unwrap()
    }

    #[test]
    fn pull_request_events_are_decoded() {
        let event = WebhookEvent::parse("pull_request", &payload("opened")).unwrap();
        let WebhookEvent::PullRequest(pr) = event else {
            panic!("expected a pull request event");
        };
        assert_eq!(pr.action, PullRequestAction::Opened);
        assert_eq!(pr.number, 3);

        let request = pr.to_request(&AccessToken::new("tok").unwrap()).unwrap();
        assert_eq!(request.target.api_url, "https://api.github.com/repos/org/cluster");
        assert_eq!(request.target.owner.as_str(), "org");
        assert_eq!(request.target.repository.as_str(), "cluster");
        assert_eq!(request.clone_url, "https://github.com/org/cluster.git");
        assert_eq!(request.number, PullRequestNumber::new(3));
        assert_eq!(request.head_ref.as_str(), "deploy-abc");
        assert_eq!(request.head_sha.as_str(), "headsha");
        assert_eq!(request.base_sha.as_str(), "basesha");
    }

    #[test]
    fn only_content_changing_actions_trigger() {
        for action in ["opened", "reopened", "synchronize"] {
            assert!(PullRequestAction::from(action.to_string()).triggers_deployment());
        }
        for action in ["closed", "labeled", "edited"] {
            assert!(!PullRequestAction::from(action.to_string()).triggers_deployment());
        }
        assert_eq!(
            PullRequestAction::from("closed".to_string()),
            PullRequestAction::Other("closed".into())
        );
    }

    #[test]
    fn ping_and_unknown_events_need_no_body() {
        assert!(matches!(WebhookEvent::parse("ping", b"not json"), Ok(WebhookEvent::Ping)));
        assert!(matches!(
            WebhookEvent::parse("push", b"{}"),
            Ok(WebhookEvent::Unsupported(name)) if name == "push"
        ));
    }

    #[test]
    fn malformed_pull_request_is_rejected() {
        let err = WebhookEvent::parse("pull_request", b"{\"action\":").unwrap_err();
        assert!(matches!(err, WebhookError::Malformed { .. }));
    }

    #[test]
    fn empty_head_sha_is_rejected() {
        let mut value: serde_json::Value = serde_json::from_slice(&payload("opened")).unwrap();
        value["pull_request"]["head"]["sha"] = json!("");
        let pr: PullRequestEvent = serde_json::from_value(value).unwrap();
        let err = pr.to_request(&AccessToken::new("tok").unwrap()).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidPayload("pull_request.head.sha")));
    }
}
