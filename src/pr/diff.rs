use std::collections::BTreeMap;

use super::types::{PullRequestRecord, PullRequestSnapshot};

/// A PR seen in both runs whose `updated_at` moved forward, with the
/// human-readable reasons derived from its counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReason<'a> {
    pub pr: &'a PullRequestRecord,
    pub reasons: Vec<String>,
}

fn by_number(current: &[PullRequestRecord]) -> BTreeMap<u64, &PullRequestRecord> {
    current.iter().map(|pr| (pr.number, pr)).collect()
}

fn previous_by_number(previous: &[PullRequestSnapshot]) -> BTreeMap<u64, &PullRequestSnapshot> {
    previous.iter().map(|pr| (pr.number, pr)).collect()
}

/// PRs whose number does not appear in the previous snapshot,
/// ascending by number.
pub fn compute_new<'a>(
    current: &'a [PullRequestRecord],
    previous: &[PullRequestSnapshot],
) -> Vec<&'a PullRequestRecord> {
    let prev = previous_by_number(previous);
    by_number(current)
        .into_values()
        .filter(|pr| !prev.contains_key(&pr.number))
        .collect()
}

/// PRs present in both snapshots whose `updated_at` strictly increased,
/// ascending by number.
///
/// Counter changes only explain an update, they never trigger one: a PR with
/// an unchanged timestamp is skipped even if its comments or commits moved.
/// PRs that disappeared since the previous run are dropped silently.
pub fn compute_updated<'a>(
    current: &'a [PullRequestRecord],
    previous: &[PullRequestSnapshot],
) -> Vec<UpdateReason<'a>> {
    let prev = previous_by_number(previous);
    by_number(current)
        .into_values()
        .filter_map(|pr| {
            let before = prev.get(&pr.number)?;
            (before.updated_at < pr.updated_at).then(|| UpdateReason {
                pr,
                reasons: change_reasons(before, pr),
            })
        })
        .collect()
}

fn change_reasons(before: &PullRequestSnapshot, after: &PullRequestRecord) -> Vec<String> {
    let mut reasons = Vec::new();
    if before.comments != after.comments {
        reasons.push(format!(
            "{} new comment(s)",
            delta(before.comments, after.comments)
        ));
    }
    if before.commits != after.commits {
        reasons.push(format!(
            "{} new commit(s)",
            delta(before.commits, after.commits)
        ));
    }
    reasons
}

/// Unknown counts count as zero. Negative deltas (e.g. after a rebase) are
/// reported as-is.
fn delta(before: Option<u32>, after: Option<u32>) -> i64 {
    i64::from(after.unwrap_or(0)) - i64::from(before.unwrap_or(0))
}
