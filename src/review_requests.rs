use std::collections::{HashMap, HashSet};

use anyhow::Result;
use tracing::info;

use crate::checks::CheckRun;
use crate::mentions::Mention;
use crate::platform::{ChecksPlatform, PullRequestLocator, PullRequestSnapshot};

/// Reviewers whose review request has been resolved.
///
/// A check run exists for everyone we ever asked; an outstanding review
/// request exists only until the person reviews. So the runs whose name no
/// longer appears among the requested reviewers/teams belong to reviewers
/// who have reviewed: those are the ones the reconciler may mark
/// successful.
pub fn resolved_reviewers(
    index: &HashMap<String, CheckRun>,
    snapshot: &PullRequestSnapshot,
) -> HashSet<String> {
    let outstanding: HashSet<&str> = snapshot
        .requested_reviewers
        .iter()
        .map(String::as_str)
        .chain(snapshot.requested_teams.iter().map(String::as_str))
        .collect();

    index
        .keys()
        .filter(|name| !outstanding.contains(name.as_str()))
        .cloned()
        .collect()
}

/// Issue review requests for desired reviewers not already tracked.
///
/// `already_tracked` covers both reviewers with an outstanding request and
/// reviewers whose check run already reflects a resolution; neither should
/// be asked again. The call is skipped entirely when nothing is missing,
/// since the platform rejects an empty request body.
pub async fn request_reviews<P: ChecksPlatform + ?Sized>(
    platform: &P,
    pr: &PullRequestLocator,
    desired: &HashSet<Mention>,
    already_tracked: &HashSet<String>,
) -> Result<()> {
    let missing: Vec<&Mention> = desired
        .iter()
        .filter(|mention| !already_tracked.contains(mention.name()))
        .collect();

    let (teams, users): (Vec<&Mention>, Vec<&Mention>) =
        missing.into_iter().partition(|mention| mention.is_team());
    let reviewers: Vec<String> = users.iter().map(|m| m.name().to_string()).collect();
    let team_reviewers: Vec<String> = teams.iter().map(|m| m.name().to_string()).collect();

    if reviewers.is_empty() && team_reviewers.is_empty() {
        info!("No review requests to issue for PR #{}", pr.number);
        return Ok(());
    }

    info!(
        "Requesting reviews on PR #{}: {} user(s), {} team(s)",
        pr.number,
        reviewers.len(),
        team_reviewers.len()
    );
    platform
        .create_review_request(pr, reviewers, team_reviewers)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::NewCheckRun;
    use crate::platform::memory::InMemoryPlatform;

    fn locator() -> PullRequestLocator {
        PullRequestLocator {
            repo_owner: "octo".to_string(),
            repo_name: "widgets".to_string(),
            number: 7,
        }
    }

    fn snapshot(requested: &[&str], teams: &[&str]) -> PullRequestSnapshot {
        PullRequestSnapshot {
            number: 7,
            author: "carol".to_string(),
            body: None,
            head_sha: "abc123".to_string(),
            requested_reviewers: requested.iter().map(|s| s.to_string()).collect(),
            requested_teams: teams.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn index_of(names: &[&str]) -> HashMap<String, CheckRun> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let new_run = NewCheckRun::pending(name);
                (
                    name.to_string(),
                    CheckRun {
                        id: i as u64 + 1,
                        name: new_run.name,
                        status: new_run.status,
                        conclusion: new_run.conclusion,
                        completed_at: new_run.completed_at,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_resolved_excludes_outstanding_requests() {
        let index = index_of(&["alice", "bob", "octo/core"]);
        let resolved = resolved_reviewers(&index, &snapshot(&["bob"], &["octo/core"]));
        assert_eq!(resolved, HashSet::from(["alice".to_string()]));
    }

    #[test]
    fn test_resolved_is_empty_with_empty_index() {
        let resolved = resolved_reviewers(&HashMap::new(), &snapshot(&["bob"], &[]));
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_skips_call_when_nothing_missing() {
        let platform = InMemoryPlatform::new();
        request_reviews(&platform, &locator(), &HashSet::new(), &HashSet::new())
            .await
            .unwrap();
        assert!(platform.review_requests().await.is_empty());
        assert_eq!(platform.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_skips_call_when_everyone_tracked() {
        let platform = InMemoryPlatform::new();
        let desired = HashSet::from([Mention::parse("@alice")]);
        let tracked = HashSet::from(["alice".to_string()]);
        request_reviews(&platform, &locator(), &desired, &tracked)
            .await
            .unwrap();
        assert!(platform.review_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_partitions_users_and_teams_into_one_call() {
        let platform = InMemoryPlatform::new();
        let desired = HashSet::from([
            Mention::parse("@alice"),
            Mention::parse("@octo/core"),
            Mention::parse("@bob"),
        ]);
        let tracked = HashSet::from(["bob".to_string()]);

        request_reviews(&platform, &locator(), &desired, &tracked)
            .await
            .unwrap();

        let requests = platform.review_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].reviewers, vec!["alice".to_string()]);
        assert_eq!(requests[0].team_reviewers, vec!["octo/core".to_string()]);
    }
}
