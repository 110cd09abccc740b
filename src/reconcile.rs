//! The state-sync core: converge the platform's check runs for a revision
//! onto the reviewer set declared in the pull request description.
//!
//! Every pass re-reads the platform before mutating, so a pass that races a
//! concurrent delivery for the same revision is corrected by the next pass.
//! There are deliberately no per-revision locks.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{info, warn};

use crate::check_index::build_check_index;
use crate::checks::{CheckConclusion, CheckRun, CheckRunPatch, NewCheckRun, RevisionKey};
use crate::mentions::Mention;
use crate::platform::ChecksPlatform;

/// Converge the revision's check runs onto `desired`.
///
/// - Desired reviewers without a run get a fresh queued run.
/// - Runs for reviewers no longer desired are reset to neutral (never
///   deleted).
/// - Runs for `resolved` reviewers are marked successful.
///
/// The pass is idempotent: a run already in its target state is left
/// untouched, so a second pass with unchanged inputs issues no mutations.
/// Each mutation is independent; failures do not abort the siblings, and
/// are reported together once everything has settled.
pub async fn reconcile_check_runs<P: ChecksPlatform + ?Sized>(
    platform: &P,
    key: &RevisionKey,
    desired: &HashSet<Mention>,
    resolved: &HashSet<String>,
) -> Result<HashMap<String, CheckRun>> {
    let mut index = build_check_index(platform, key).await?;

    let desired_names: HashSet<&str> = desired.iter().map(Mention::name).collect();
    let missing: Vec<&str> = desired_names
        .iter()
        .copied()
        .filter(|name| !index.contains_key(*name))
        .collect();
    let extra: HashSet<String> = index
        .keys()
        .filter(|name| !desired_names.contains(name.as_str()))
        .cloned()
        .collect();

    info!(
        "Reconciling {}: {} desired, {} indexed, {} to create, {} extra, {} resolved",
        key.head_sha,
        desired.len(),
        index.len(),
        missing.len(),
        extra.len(),
        resolved.len()
    );

    let mut failures: Vec<(String, anyhow::Error)> = Vec::new();

    // Create queued runs for newly desired reviewers first: the working
    // index must contain them before the reset/succeed passes look them up.
    let created = join_all(missing.into_iter().map(|name| async move {
        (
            name.to_string(),
            platform.create_check_run(key, NewCheckRun::pending(name)).await,
        )
    }))
    .await;
    for (name, result) in created {
        match result {
            Ok(run) => {
                index.insert(run.name.clone(), run);
            }
            Err(e) => {
                warn!("Failed to create check run for {}: {}", name, e);
                failures.push((name, e));
            }
        }
    }

    // Resets and successes touch disjoint runs (a run being reset is no
    // longer desired and is excluded from the succeed set), so they fan out
    // concurrently. The pass must not return until every mutation settles.
    // Runs already in their target state are skipped, which is what makes
    // a repeated pass issue no mutations at all.
    let now = Utc::now();
    let mut updates: Vec<(String, u64, CheckRunPatch)> = Vec::new();
    for run in extra.iter().filter_map(|name| index.get(name)) {
        if !run.has_concluded(CheckConclusion::Neutral) {
            updates.push((run.name.clone(), run.id, CheckRunPatch::no_longer_required(now)));
        }
    }
    for run in resolved
        .iter()
        .filter(|name| !extra.contains(*name))
        .filter_map(|name| index.get(name))
    {
        if !run.has_concluded(CheckConclusion::Success) {
            updates.push((run.name.clone(), run.id, CheckRunPatch::succeeded(now)));
        }
    }

    let outcomes = join_all(updates.into_iter().map(|(name, id, patch)| async move {
        (name, platform.update_check_run(key, id, patch).await)
    }))
    .await;
    for (name, result) in outcomes {
        match result {
            Ok(run) => {
                index.insert(run.name.clone(), run);
            }
            Err(e) => {
                warn!("Failed to update check run for {}: {}", name, e);
                failures.push((name, e));
            }
        }
    }

    if failures.is_empty() {
        Ok(index)
    } else {
        Err(batch_failure(failures))
    }
}

/// Roll individual mutation failures into one error naming each reviewer,
/// so the caller can see exactly which records are stuck.
fn batch_failure(failures: Vec<(String, anyhow::Error)>) -> anyhow::Error {
    let details = failures
        .iter()
        .map(|(name, e)| format!("{}: {:#}", name, e))
        .collect::<Vec<_>>()
        .join("; ");
    anyhow!(
        "{} check-run mutation(s) failed: {}",
        failures.len(),
        details
    )
}
