use serde::Deserialize;

use crate::pr::PullRequestEvent;

/// The subset of a `pull_request` webhook payload the bot reads.
#[derive(Debug, Deserialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Repository,
    #[serde(default)]
    pub installation: Option<Installation>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub number: u64,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Owner,
}

#[derive(Debug, Deserialize)]
pub struct Owner {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct Installation {
    pub id: u64,
}

impl PullRequestPayload {
    pub fn into_event(self) -> PullRequestEvent {
        PullRequestEvent {
            owner: self.repository.owner.login,
            repo: self.repository.name,
            number: self.pull_request.number,
            installation_id: self.installation.map(|i| i.id),
        }
    }
}
