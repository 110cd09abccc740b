use std::collections::HashMap;

use anyhow::Result;
use tracing::info;

use crate::checks::{CheckRun, RevisionKey};
use crate::platform::ChecksPlatform;

/// Flatten every check suite attached to a revision into one map keyed by
/// check-run name.
///
/// A revision accumulates multiple suites over time (re-runs, runs created
/// through different paths), so the same name can appear more than once.
/// Duplicates resolve last-write-wins in platform enumeration order; the
/// platform guarantees nothing about that order, so this is best-effort
/// dedup rather than an authoritative choice.
pub async fn build_check_index<P: ChecksPlatform + ?Sized>(
    platform: &P,
    key: &RevisionKey,
) -> Result<HashMap<String, CheckRun>> {
    let mut index = HashMap::new();
    let mut suite_count = 0;
    for suite_id in platform.list_check_suites(key).await? {
        suite_count += 1;
        for run in platform.list_check_runs(key, suite_id).await? {
            index.insert(run.name.clone(), run);
        }
    }
    info!(
        "Indexed {} check runs across {} suites for {}",
        index.len(),
        suite_count,
        key.head_sha
    );
    Ok(index)
}
