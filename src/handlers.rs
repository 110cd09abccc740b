//! Entry points invoked by the webhook router, one per event category.
//! Each handler re-derives everything it needs from the platform; nothing
//! is cached between events.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{info, warn};

use crate::check_index::build_check_index;
use crate::checks::{CheckConclusion, CheckRunPatch, NewCheckRun, RevisionKey};
use crate::mentions::extract_mentions;
use crate::platform::{ChecksPlatform, PullRequestLocator};
use crate::reconcile::reconcile_check_runs;
use crate::review_requests::{request_reviews, resolved_reviewers};
use crate::review_status::{review_status, ReviewEvent};

#[derive(Clone)]
pub struct EventProcessor<P> {
    platform: Arc<P>,
    /// The login our own review requests arrive under, e.g.
    /// `reviewbot[bot]`. Used to tell our echoes apart from everyone
    /// else's requests.
    bot_login: String,
}

impl<P: ChecksPlatform> EventProcessor<P> {
    pub fn new(platform: Arc<P>, bot_login: String) -> Self {
        EventProcessor {
            platform,
            bot_login,
        }
    }

    /// A pull request was opened, reopened, or its description edited.
    ///
    /// Re-reads the description and the platform's check state, converges
    /// the check runs, then asks for reviews from anyone not yet tracked.
    pub async fn on_pull_request_changed(&self, pr: &PullRequestLocator) -> Result<()> {
        let snapshot = self.platform.get_pull_request(pr).await?;
        let desired = extract_mentions(snapshot.body.as_deref().unwrap_or(""), &snapshot.author);
        let key = pr.revision(&snapshot.head_sha);

        let index = build_check_index(&*self.platform, &key).await?;
        let resolved = resolved_reviewers(&index, &snapshot);

        reconcile_check_runs(&*self.platform, &key, &desired, &resolved).await?;

        // Anyone with a check run or an outstanding request is tracked:
        // resolved covers the former minus the latter, so add the
        // outstanding requests back in.
        let mut tracked: HashSet<String> = resolved;
        tracked.extend(snapshot.requested_reviewers.iter().cloned());
        tracked.extend(snapshot.requested_teams.iter().cloned());

        request_reviews(&*self.platform, pr, &desired, &tracked).await
    }

    /// A review was submitted or dismissed: upsert that one reviewer's run
    /// on the commit the review applies to.
    pub async fn on_review(
        &self,
        repo_owner: &str,
        repo_name: &str,
        event: &ReviewEvent,
    ) -> Result<()> {
        let key = RevisionKey {
            repo_owner: repo_owner.to_string(),
            repo_name: repo_name.to_string(),
            head_sha: event.commit_id.clone(),
        };
        let state = review_status(event);
        info!(
            "Review from {} on {}: recording {:?}/{:?}",
            event.reviewer, event.commit_id, state.status, state.conclusion
        );
        self.platform
            .create_check_run(&key, state.into_new_check_run(&event.reviewer))
            .await?;
        Ok(())
    }

    /// A reviewer was requested on a pull request.
    ///
    /// Only our own review-request calls echoing back are acted on; a
    /// request issued by anyone else is not part of a `/review` directive,
    /// and reacting to it would let us trigger ourselves in a loop.
    pub async fn on_review_requested(
        &self,
        key: &RevisionKey,
        reviewer: &str,
        sender: &str,
    ) -> Result<()> {
        if sender != self.bot_login {
            info!(
                "Review request for {} sent by {}, not by {}; ignoring",
                reviewer, sender, self.bot_login
            );
            return Ok(());
        }
        self.platform
            .create_check_run(key, NewCheckRun::awaiting_review(reviewer))
            .await?;
        Ok(())
    }

    /// Manual re-evaluation: a check suite was (re)requested. Reset every
    /// run on the revision, then reconcile each affected pull request from
    /// scratch.
    pub async fn on_check_suite_requested(
        &self,
        key: &RevisionKey,
        affected: &[PullRequestLocator],
    ) -> Result<()> {
        let index = build_check_index(&*self.platform, key).await?;
        let now = Utc::now();

        let outcomes = join_all(
            index
                .values()
                .filter(|run| !run.has_concluded(CheckConclusion::Neutral))
                .map(|run| {
                    let name = run.name.clone();
                    let id = run.id;
                    async move {
                        (
                            name,
                            self.platform
                                .update_check_run(key, id, CheckRunPatch::no_longer_required(now))
                                .await,
                        )
                    }
                }),
        )
        .await;
        for (name, result) in outcomes {
            if let Err(e) = result {
                // The reconcile below re-reads state, so a failed reset is
                // picked up on the next pass for this revision.
                warn!("Failed to reset check run for {}: {}", name, e);
            }
        }

        for pr in affected {
            if let Err(e) = self.on_pull_request_changed(pr).await {
                warn!("Failed to re-evaluate PR #{}: {}", pr.number, e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CheckStatus;
    use crate::platform::memory::InMemoryPlatform;
    use crate::platform::PullRequestSnapshot;
    use crate::review_status::ReviewVerdict;

    const BOT: &str = "reviewbot[bot]";

    fn locator() -> PullRequestLocator {
        PullRequestLocator {
            repo_owner: "octo".to_string(),
            repo_name: "widgets".to_string(),
            number: 7,
        }
    }

    fn revision() -> RevisionKey {
        locator().revision("abc123")
    }

    fn processor(platform: Arc<InMemoryPlatform>) -> EventProcessor<InMemoryPlatform> {
        EventProcessor::new(platform, BOT.to_string())
    }

    async fn seed_pr(platform: &InMemoryPlatform, body: &str) {
        platform
            .seed_pull_request(
                locator(),
                PullRequestSnapshot {
                    number: 7,
                    author: "carol".to_string(),
                    body: Some(body.to_string()),
                    head_sha: "abc123".to_string(),
                    requested_reviewers: Vec::new(),
                    requested_teams: Vec::new(),
                },
            )
            .await;
    }

    #[tokio::test]
    async fn test_pull_request_changed_creates_checks_and_requests_reviews() {
        let platform = Arc::new(InMemoryPlatform::new());
        seed_pr(&platform, "Fixes a bug.\n\n/review @alice @octo/core").await;

        processor(platform.clone())
            .on_pull_request_changed(&locator())
            .await
            .unwrap();

        let runs = platform.check_runs_for(&revision()).await;
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|run| run.status == CheckStatus::Queued));

        let requests = platform.review_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].reviewers, vec!["alice".to_string()]);
        assert_eq!(requests[0].team_reviewers, vec!["octo/core".to_string()]);
    }

    #[tokio::test]
    async fn test_pull_request_without_directive_is_a_no_op() {
        let platform = Arc::new(InMemoryPlatform::new());
        seed_pr(&platform, "No directive here.").await;

        processor(platform.clone())
            .on_pull_request_changed(&locator())
            .await
            .unwrap();

        assert!(platform.check_runs_for(&revision()).await.is_empty());
        assert!(platform.review_requests().await.is_empty());
        assert_eq!(platform.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_review_submitted_upserts_successful_run() {
        let platform = Arc::new(InMemoryPlatform::new());
        let at = Utc::now();

        processor(platform.clone())
            .on_review(
                "octo",
                "widgets",
                &ReviewEvent {
                    reviewer: "alice".to_string(),
                    state: ReviewVerdict::Approved,
                    submitted_at: Some(at),
                    commit_id: "abc123".to_string(),
                },
            )
            .await
            .unwrap();

        let runs = platform.check_runs_for(&revision()).await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "alice");
        assert_eq!(runs[0].conclusion, Some(CheckConclusion::Success));
        assert_eq!(runs[0].completed_at, Some(at));
    }

    #[tokio::test]
    async fn test_review_dismissed_reopens_run() {
        let platform = Arc::new(InMemoryPlatform::new());

        processor(platform.clone())
            .on_review(
                "octo",
                "widgets",
                &ReviewEvent {
                    reviewer: "alice".to_string(),
                    state: ReviewVerdict::Dismissed,
                    submitted_at: None,
                    commit_id: "abc123".to_string(),
                },
            )
            .await
            .unwrap();

        let runs = platform.check_runs_for(&revision()).await;
        assert_eq!(runs[0].status, CheckStatus::InProgress);
        assert!(runs[0].conclusion.is_none());
    }

    #[tokio::test]
    async fn test_review_requested_by_stranger_is_ignored() {
        let platform = Arc::new(InMemoryPlatform::new());

        processor(platform.clone())
            .on_review_requested(&revision(), "alice", "mallory")
            .await
            .unwrap();

        assert!(platform.check_runs_for(&revision()).await.is_empty());
        assert_eq!(platform.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_review_requested_by_bot_creates_queued_run() {
        let platform = Arc::new(InMemoryPlatform::new());

        processor(platform.clone())
            .on_review_requested(&revision(), "alice", BOT)
            .await
            .unwrap();

        let runs = platform.check_runs_for(&revision()).await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "alice");
        assert_eq!(runs[0].status, CheckStatus::Queued);
    }

    #[tokio::test]
    async fn test_check_suite_requested_resets_then_reconciles() {
        let platform = Arc::new(InMemoryPlatform::new());
        seed_pr(&platform, "/review @alice").await;

        // Stale state from some earlier revision handling: a run for bob,
        // nothing yet for the desired reviewer alice.
        let suite = platform.add_suite(&revision()).await;
        platform.add_run(suite, NewCheckRun::pending("bob")).await;

        processor(platform.clone())
            .on_check_suite_requested(&revision(), &[locator()])
            .await
            .unwrap();

        let runs = platform.check_runs_for(&revision()).await;
        let alice = runs.iter().find(|run| run.name == "alice").unwrap();
        let bob = runs.iter().find(|run| run.name == "bob").unwrap();
        // bob was reset by the suite pass and stays neutral; alice was
        // created queued by the follow-up reconcile.
        assert_eq!(bob.status, CheckStatus::Completed);
        assert_eq!(bob.conclusion, Some(CheckConclusion::Neutral));
        assert_eq!(alice.status, CheckStatus::Queued);
        assert!(alice.conclusion.is_none());

        // And alice's review was requested.
        let requests = platform.review_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].reviewers, vec!["alice".to_string()]);
    }
}
