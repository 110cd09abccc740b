use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::checks::{CheckConclusion, CheckOutput, CheckStatus, NewCheckRun};

/// The verdict carried by a submitted or dismissed review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
    Dismissed,
    /// Also covers any verdict GitHub adds later; they classify the same
    /// way a plain comment review does.
    #[serde(other)]
    Commented,
}

/// One submitted or dismissed review, as delivered by the platform.
#[derive(Debug, Clone)]
pub struct ReviewEvent {
    pub reviewer: String,
    pub state: ReviewVerdict,
    pub submitted_at: Option<DateTime<Utc>>,
    pub commit_id: String,
}

/// Target check-run state derived from a single review event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCheckState {
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReviewCheckState {
    /// Creation body that upserts this state onto the reviewer's check run.
    /// Creating a run under an existing name supersedes the previous run on
    /// the platform, which is what makes this an upsert.
    pub fn into_new_check_run(self, reviewer: &str) -> NewCheckRun {
        let summary = match self.conclusion {
            Some(_) => format!("@{} submitted a review.", reviewer),
            None => format!(
                "The review from @{} was dismissed; waiting for a new one.",
                reviewer
            ),
        };
        NewCheckRun {
            name: reviewer.to_string(),
            status: self.status,
            conclusion: self.conclusion,
            completed_at: self.completed_at,
            output: CheckOutput {
                title: format!("{} reviewed!", reviewer),
                summary,
            },
        }
    }
}

/// Map one review event onto the check-run state it should produce.
///
/// A dismissed review reopens the check. Every submitted review, including
/// "changes requested", concludes the check as a success: the check tracks
/// whether the person reviewed, not whether they approved. Callers depend
/// on that asymmetry, so do not collapse changes-requested into a failure.
pub fn review_status(event: &ReviewEvent) -> ReviewCheckState {
    match event.state {
        ReviewVerdict::Dismissed => ReviewCheckState {
            status: CheckStatus::InProgress,
            conclusion: None,
            completed_at: None,
        },
        ReviewVerdict::Approved | ReviewVerdict::ChangesRequested | ReviewVerdict::Commented => {
            ReviewCheckState {
                status: CheckStatus::Completed,
                conclusion: Some(CheckConclusion::Success),
                completed_at: event.submitted_at,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(state: ReviewVerdict, submitted_at: Option<DateTime<Utc>>) -> ReviewEvent {
        ReviewEvent {
            reviewer: "alice".to_string(),
            state,
            submitted_at,
            commit_id: "abc123".to_string(),
        }
    }

    #[test]
    fn test_dismissed_reopens_the_check() {
        let state = review_status(&event(ReviewVerdict::Dismissed, None));
        assert_eq!(
            state,
            ReviewCheckState {
                status: CheckStatus::InProgress,
                conclusion: None,
                completed_at: None,
            }
        );
    }

    #[test]
    fn test_changes_requested_counts_as_reviewed() {
        let at = Utc::now();
        let state = review_status(&event(ReviewVerdict::ChangesRequested, Some(at)));
        assert_eq!(
            state,
            ReviewCheckState {
                status: CheckStatus::Completed,
                conclusion: Some(CheckConclusion::Success),
                completed_at: Some(at),
            }
        );
    }

    #[test]
    fn test_approved_and_commented_classify_alike() {
        let at = Utc::now();
        let approved = review_status(&event(ReviewVerdict::Approved, Some(at)));
        let commented = review_status(&event(ReviewVerdict::Commented, Some(at)));
        assert_eq!(approved, commented);
        assert_eq!(approved.conclusion, Some(CheckConclusion::Success));
    }

    #[test]
    fn test_unknown_verdict_deserializes_as_commented() {
        let verdict: ReviewVerdict = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(verdict, ReviewVerdict::Commented);
    }

    #[test]
    fn test_upsert_body_for_dismissed_has_no_conclusion() {
        let run = review_status(&event(ReviewVerdict::Dismissed, None))
            .into_new_check_run("alice");
        assert_eq!(run.name, "alice");
        assert_eq!(run.status, CheckStatus::InProgress);
        assert!(run.conclusion.is_none());
        assert!(run.completed_at.is_none());
    }
}
