use std::fmt;

/// The pull request a webhook delivery refers to.
///
/// Built from the `pull_request.opened` payload and consumed once by the
/// review pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    /// Repository owner login (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// PR number, which is also its issue number
    pub number: u64,
    /// GitHub App installation the delivery came from
    pub installation_id: Option<u64>,
}

impl fmt::Display for PullRequestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}
