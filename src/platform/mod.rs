//! The boundary between the reconciliation engine and the collaboration
//! platform. Everything the engine does goes through [`ChecksPlatform`];
//! the GitHub implementation lives in `crate::github`, and an in-memory
//! implementation for the test suite lives in [`memory`].

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::checks::{CheckRun, CheckRunPatch, NewCheckRun, RevisionKey};

/// Locates a pull request within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestLocator {
    pub repo_owner: String,
    pub repo_name: String,
    pub number: u64,
}

impl PullRequestLocator {
    pub fn revision(&self, head_sha: &str) -> RevisionKey {
        RevisionKey {
            repo_owner: self.repo_owner.clone(),
            repo_name: self.repo_name.clone(),
            head_sha: head_sha.to_string(),
        }
    }
}

/// Point-in-time view of a pull request, fetched fresh for every event.
#[derive(Debug, Clone)]
pub struct PullRequestSnapshot {
    pub number: u64,
    pub author: String,
    pub body: Option<String>,
    pub head_sha: String,
    /// Logins of individuals with an outstanding review request.
    pub requested_reviewers: Vec<String>,
    /// Teams with an outstanding review request, as `org/team`.
    pub requested_teams: Vec<String>,
}

/// The platform capabilities the engine consumes.
///
/// All state lives behind this trait; the engine keeps nothing in memory
/// between events and re-reads before every mutation.
#[async_trait]
pub trait ChecksPlatform: Send + Sync {
    /// Check-suite ids attached to a revision, in platform enumeration
    /// order. A revision can have several (re-runs, multiple creators).
    async fn list_check_suites(&self, key: &RevisionKey) -> Result<Vec<u64>>;

    async fn list_check_runs(&self, key: &RevisionKey, suite_id: u64) -> Result<Vec<CheckRun>>;

    async fn create_check_run(&self, key: &RevisionKey, new_run: NewCheckRun) -> Result<CheckRun>;

    async fn update_check_run(
        &self,
        key: &RevisionKey,
        check_run_id: u64,
        patch: CheckRunPatch,
    ) -> Result<CheckRun>;

    /// Issue one combined review request for individuals and teams.
    async fn create_review_request(
        &self,
        pr: &PullRequestLocator,
        reviewers: Vec<String>,
        team_reviewers: Vec<String>,
    ) -> Result<()>;

    async fn get_pull_request(&self, pr: &PullRequestLocator) -> Result<PullRequestSnapshot>;
}
