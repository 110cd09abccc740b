//! In-memory implementation of `ChecksPlatform`.
//!
//! Models just enough platform behavior to drive the engine in tests:
//! suites and runs are stored per revision, review requests are recorded
//! and reflected back into the pull-request snapshot, and individual
//! check-run mutations can be made to fail on demand.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ChecksPlatform, PullRequestLocator, PullRequestSnapshot};
use crate::checks::{CheckRun, CheckRunPatch, NewCheckRun, RevisionKey};

/// One recorded `create_review_request` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReviewRequest {
    pub pr: PullRequestLocator,
    pub reviewers: Vec<String>,
    pub team_reviewers: Vec<String>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    /// Suite ids per revision, in creation order.
    suites: HashMap<RevisionKey, Vec<u64>>,
    /// Runs per suite, in creation order.
    runs: HashMap<u64, Vec<CheckRun>>,
    pulls: HashMap<PullRequestLocator, PullRequestSnapshot>,
    review_requests: Vec<RecordedReviewRequest>,
    /// Check-run names whose create/update calls fail.
    failing: HashSet<String>,
}

impl State {
    fn fresh_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct InMemoryPlatform {
    state: RwLock<State>,
    /// Count of mutating platform calls, for idempotence assertions.
    mutations: AtomicU64,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        InMemoryPlatform {
            state: RwLock::new(State::default()),
            mutations: AtomicU64::new(0),
        }
    }

    pub async fn seed_pull_request(&self, pr: PullRequestLocator, snapshot: PullRequestSnapshot) {
        let mut state = self.state.write().await;
        state.pulls.insert(pr, snapshot);
    }

    /// Create an empty check suite for a revision and return its id.
    pub async fn add_suite(&self, key: &RevisionKey) -> u64 {
        let mut state = self.state.write().await;
        let suite_id = state.fresh_id();
        state.suites.entry(key.clone()).or_default().push(suite_id);
        state.runs.insert(suite_id, Vec::new());
        suite_id
    }

    /// Insert a pre-existing run into a specific suite.
    pub async fn add_run(&self, suite_id: u64, run: NewCheckRun) -> CheckRun {
        let mut state = self.state.write().await;
        let id = state.fresh_id();
        let run = materialize(id, run);
        state
            .runs
            .get_mut(&suite_id)
            .expect("unknown suite id")
            .push(run.clone());
        run
    }

    /// Make every subsequent create/update for this check-run name fail.
    pub async fn fail_mutations_for(&self, name: &str) {
        let mut state = self.state.write().await;
        state.failing.insert(name.to_string());
    }

    /// All runs for a revision, flattened in enumeration order.
    pub async fn check_runs_for(&self, key: &RevisionKey) -> Vec<CheckRun> {
        let state = self.state.read().await;
        state
            .suites
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|suite_id| state.runs.get(suite_id))
            .flatten()
            .cloned()
            .collect()
    }

    pub async fn review_requests(&self) -> Vec<RecordedReviewRequest> {
        let state = self.state.read().await;
        state.review_requests.clone()
    }

    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn materialize(id: u64, new_run: NewCheckRun) -> CheckRun {
    CheckRun {
        id,
        name: new_run.name,
        status: new_run.status,
        conclusion: new_run.conclusion,
        completed_at: new_run.completed_at,
    }
}

#[async_trait]
impl ChecksPlatform for InMemoryPlatform {
    async fn list_check_suites(&self, key: &RevisionKey) -> Result<Vec<u64>> {
        let state = self.state.read().await;
        Ok(state.suites.get(key).cloned().unwrap_or_default())
    }

    async fn list_check_runs(&self, _key: &RevisionKey, suite_id: u64) -> Result<Vec<CheckRun>> {
        let state = self.state.read().await;
        state
            .runs
            .get(&suite_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown check suite {}", suite_id))
    }

    async fn create_check_run(&self, key: &RevisionKey, new_run: NewCheckRun) -> Result<CheckRun> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        if state.failing.contains(&new_run.name) {
            return Err(anyhow!("injected failure creating check run {}", new_run.name));
        }
        // Creating under an existing suite if one exists, otherwise the
        // platform opens one implicitly.
        let suite_id = match state.suites.get(key).and_then(|ids| ids.first()) {
            Some(id) => *id,
            None => {
                let suite_id = state.fresh_id();
                state.suites.entry(key.clone()).or_default().push(suite_id);
                state.runs.insert(suite_id, Vec::new());
                suite_id
            }
        };
        let id = state.fresh_id();
        let run = materialize(id, new_run);
        state
            .runs
            .get_mut(&suite_id)
            .expect("suite just ensured")
            .push(run.clone());
        Ok(run)
    }

    async fn update_check_run(
        &self,
        _key: &RevisionKey,
        check_run_id: u64,
        patch: CheckRunPatch,
    ) -> Result<CheckRun> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        let failing = state.failing.clone();
        for runs in state.runs.values_mut() {
            if let Some(run) = runs.iter_mut().find(|run| run.id == check_run_id) {
                if failing.contains(&run.name) {
                    return Err(anyhow!("injected failure updating check run {}", run.name));
                }
                if let Some(status) = patch.status {
                    run.status = status;
                }
                if let Some(conclusion) = patch.conclusion {
                    run.conclusion = Some(conclusion);
                }
                if let Some(completed_at) = patch.completed_at {
                    run.completed_at = Some(completed_at);
                }
                return Ok(run.clone());
            }
        }
        Err(anyhow!("unknown check run {}", check_run_id))
    }

    async fn create_review_request(
        &self,
        pr: &PullRequestLocator,
        reviewers: Vec<String>,
        team_reviewers: Vec<String>,
    ) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        if let Some(snapshot) = state.pulls.get_mut(pr) {
            snapshot.requested_reviewers.extend(reviewers.clone());
            snapshot.requested_teams.extend(team_reviewers.clone());
        }
        state.review_requests.push(RecordedReviewRequest {
            pr: pr.clone(),
            reviewers,
            team_reviewers,
        });
        Ok(())
    }

    async fn get_pull_request(&self, pr: &PullRequestLocator) -> Result<PullRequestSnapshot> {
        let state = self.state.read().await;
        state
            .pulls
            .get(pr)
            .cloned()
            .ok_or_else(|| anyhow!("unknown pull request #{}", pr.number))
    }
}
