use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the commit a set of check runs is attached to.
///
/// Check runs are scoped to a single revision: when a pull request gains a
/// new head commit, a fresh set of runs is created against that commit and
/// the old ones simply stop being relevant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionKey {
    pub repo_owner: String,
    pub repo_name: String,
    pub head_sha: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
}

/// One reviewer's check state for one revision, as reported by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckRun {
    pub id: u64,
    pub name: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CheckRun {
    /// True when the run already carries the given terminal conclusion, so
    /// re-applying it would be a pointless mutation.
    pub fn has_concluded(&self, conclusion: CheckConclusion) -> bool {
        self.status == CheckStatus::Completed && self.conclusion == Some(conclusion)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutput {
    pub title: String,
    pub summary: String,
}

/// Creation body for a new check run.
#[derive(Debug, Clone, Serialize)]
pub struct NewCheckRun {
    pub name: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<CheckConclusion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub output: CheckOutput,
}

impl NewCheckRun {
    /// A queued run for a reviewer who has just been mentioned in the
    /// `/review` directive and has not reviewed yet.
    pub fn pending(name: &str) -> Self {
        NewCheckRun {
            name: name.to_string(),
            status: CheckStatus::Queued,
            conclusion: None,
            completed_at: None,
            output: CheckOutput {
                title: format!("{} pending review", name),
                summary: format!("Waiting for a review from @{}.", name),
            },
        }
    }

    /// A queued run created in response to our own review-request call
    /// echoing back through the webhook.
    pub fn awaiting_review(name: &str) -> Self {
        NewCheckRun {
            name: name.to_string(),
            status: CheckStatus::Queued,
            conclusion: None,
            completed_at: None,
            output: CheckOutput {
                title: format!("{} asked for review", name),
                summary: "Waiting for the review.".to_string(),
            },
        }
    }
}

/// Partial update body for an existing check run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckRunPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<CheckConclusion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CheckOutput>,
}

impl CheckRunPatch {
    /// Marks a run as no longer required. The run is never deleted: a
    /// neutral conclusion is the closest the platform offers.
    pub fn no_longer_required(at: DateTime<Utc>) -> Self {
        CheckRunPatch {
            status: Some(CheckStatus::Completed),
            conclusion: Some(CheckConclusion::Neutral),
            completed_at: Some(at),
            ..Default::default()
        }
    }

    /// Marks a run as satisfied by a resolved review.
    pub fn succeeded(at: DateTime<Utc>) -> Self {
        CheckRunPatch {
            status: Some(CheckStatus::Completed),
            conclusion: Some(CheckConclusion::Success),
            completed_at: Some(at),
            ..Default::default()
        }
    }
}
