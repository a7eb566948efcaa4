use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::pr::{HostError, PullRequestEvent, PullRequestHost};
use crate::review::{build_prompt, GenerationError, ReviewGenerator};

/// Pipeline stage at which a review attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchDiff,
    Generate,
    PostComment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::FetchDiff => write!(f, "fetch_diff"),
            Stage::Generate => write!(f, "generate"),
            Stage::PostComment => write!(f, "post_comment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Failed to fetch diff for {pr}: {source}")]
    Fetch { pr: String, source: HostError },

    #[error("Failed to generate review for {pr}: {source}")]
    Generation { pr: String, source: GenerationError },

    #[error("Failed to post review on {pr}: {source}")]
    Post { pr: String, source: HostError },
}

impl ReviewError {
    pub fn stage(&self) -> Stage {
        match self {
            ReviewError::Fetch { .. } => Stage::FetchDiff,
            ReviewError::Generation { .. } => Stage::Generate,
            ReviewError::Post { .. } => Stage::PostComment,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ReviewError::Fetch { source, .. } | ReviewError::Post { source, .. } => source.status(),
            ReviewError::Generation { source, .. } => source.status(),
        }
    }
}

/// How one `pull_request.opened` delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Posted,
    Aborted(Stage),
}

/// Reviews newly opened pull requests: fetch diff, build prompt, generate,
/// comment. Holds no per-delivery state.
pub struct EventHandler {
    host: Arc<dyn PullRequestHost>,
    generator: ReviewGenerator,
}

impl EventHandler {
    pub fn new(host: Arc<dyn PullRequestHost>, generator: ReviewGenerator) -> Self {
        Self { host, generator }
    }

    /// Run the review pipeline once for `event`.
    ///
    /// Failures are logged and end the pipeline; nothing is retried and
    /// nothing is propagated. Re-delivered events are reviewed again.
    #[instrument(skip(self), fields(owner = %event.owner, repo = %event.repo, pr = event.number))]
    pub async fn on_pull_request_opened(&self, event: &PullRequestEvent) -> ReviewOutcome {
        info!("received a pull request event for #{}", event.number);

        match self.review(event).await {
            Ok(()) => ReviewOutcome::Posted,
            Err(err) => {
                error!(stage = %err.stage(), status = err.status(), error = %err, "review aborted");
                ReviewOutcome::Aborted(err.stage())
            }
        }
    }

    async fn review(&self, event: &PullRequestEvent) -> Result<(), ReviewError> {
        let diff = self
            .host
            .fetch_diff(event)
            .await
            .map_err(|source| ReviewError::Fetch {
                pr: event.to_string(),
                source,
            })?;
        info!(diff_bytes = diff.len(), "received pull request diff");

        let prompt = build_prompt(&diff);

        let review = self
            .generator
            .generate_review(&prompt)
            .await
            .map_err(|source| ReviewError::Generation {
                pr: event.to_string(),
                source,
            })?;
        info!(review_bytes = review.len(), "review generated");

        self.host
            .post_comment(event, &review)
            .await
            .map_err(|source| ReviewError::Post {
                pr: event.to_string(),
                source,
            })?;
        info!("code review posted");

        Ok(())
    }
}
