use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::delivery::{self, Deliver};
use crate::pr::diff::{compute_new, compute_updated};
use crate::pr::{Collector, PrError, PullRequestSource};
use crate::report::{self, Layout};
use crate::snapshot::{SnapshotError, SnapshotStore};

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error(transparent)]
    Collect(#[from] PrError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// What a single run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub fetched: usize,
    pub new: usize,
    pub updated: usize,
    /// None when there was nothing to send
    pub delivered: Option<bool>,
}

/// One polling pass: fetch, load the previous snapshot, diff, report,
/// then persist what was fetched as the next baseline.
///
/// A failed fetch returns before the snapshot is touched. A failed
/// delivery does not prevent the save.
#[instrument(skip_all)]
pub async fn run_once<S: PullRequestSource>(
    collector: &Collector<S>,
    store: &SnapshotStore,
    deliverer: &dyn Deliver,
    layout: &Layout,
) -> Result<RunOutcome, NotifierError> {
    let current = collector.fetch().await?;
    let previous = store.load()?;
    debug!(current = current.len(), previous = previous.len(), "comparing snapshots");

    let new = compute_new(&current, &previous);
    let updated = compute_updated(&current, &previous);
    info!(new = new.len(), updated = updated.len(), "computed changes");

    let delivered = match report::compose(layout, &current, &new, &updated) {
        Some(text) => Some(delivery::deliver(deliverer, &text).await),
        None => {
            info!("nothing to send");
            None
        }
    };

    let outcome = RunOutcome {
        fetched: current.len(),
        new: new.len(),
        updated: updated.len(),
        delivered,
    };
    store.save(&current)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::{PullRequestRecord, RepoName};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Mutex;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn record(number: u64, updated_at: DateTime<Utc>, commits: u32) -> PullRequestRecord {
        PullRequestRecord {
            number,
            updated_at,
            commits: Some(commits),
            comments: Some(0),
            author: "alice".to_string(),
            title: format!("PR {number}"),
            url: format!("https://github.com/org/repo/pull/{number}"),
            labels: vec![],
        }
    }

    struct FakeSource {
        prs: Mutex<Result<Vec<PullRequestRecord>, ()>>,
    }

    impl FakeSource {
        fn new(prs: Vec<PullRequestRecord>) -> Self {
            Self {
                prs: Mutex::new(Ok(prs)),
            }
        }

        fn set(&self, prs: Result<Vec<PullRequestRecord>, ()>) {
            *self.prs.lock().unwrap() = prs;
        }
    }

    #[async_trait]
    impl<'a> PullRequestSource for &'a FakeSource {
        async fn open_pull_requests(
            &self,
            repo: &RepoName,
        ) -> Result<Vec<PullRequestRecord>, PrError> {
            self.prs
                .lock()
                .unwrap()
                .clone()
                .map_err(|()| PrError::InvalidRepo(repo.to_string()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Deliver for Recorder {
        async fn send(&self, text: &str) -> bool {
            self.sent.lock().unwrap().push(text.to_string());
            true
        }
    }

    fn layout() -> Layout {
        Layout {
            title: "Bot:".to_string(),
            new_header: "New PRS:".to_string(),
            updated_header: "updated PRS:".to_string(),
            label_sections: vec![],
        }
    }

    fn repos() -> Vec<RepoName> {
        vec![RepoName {
            owner: "org".to_string(),
            name: "repo".to_string(),
        }]
    }

    #[tokio::test]
    async fn test_first_run_reports_everything_as_new() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("prs.json"));
        let source = FakeSource::new(vec![record(1, t0(), 1), record(2, t0(), 1)]);
        let collector = Collector::new(&source, repos());
        let recorder = Recorder::default();

        let outcome = run_once(&collector, &store, &recorder, &layout()).await.unwrap();

        assert_eq!(outcome.new, 2);
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.delivered, Some(true));
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_run_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("prs.json"));
        let prs = vec![record(1, t0(), 1)];
        store.save(&prs).unwrap();
        let source = FakeSource::new(prs);
        let collector = Collector::new(&source, repos());
        let recorder = Recorder::default();

        let outcome = run_once(&collector, &store, &recorder, &layout()).await.unwrap();

        assert_eq!(outcome.delivered, None);
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_and_updated_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("prs.json"));
        let source = FakeSource::new(vec![record(1, t0(), 2)]);
        let collector = Collector::new(&source, repos());
        let recorder = Recorder::default();
        run_once(&collector, &store, &recorder, &layout()).await.unwrap();

        source.set(Ok(vec![
            record(1, t0() + Duration::hours(1), 3),
            record(2, t0() + Duration::hours(2), 0),
        ]));
        let outcome = run_once(&collector, &store, &recorder, &layout()).await.unwrap();

        assert_eq!(outcome.new, 1);
        assert_eq!(outcome.updated, 1);
        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[1],
            "Bot:\nNew PRS:\n* From alice #2 https://github.com/org/repo/pull/2 :: PR 2\n\
             updated PRS:\n* From alice #1 https://github.com/org/repo/pull/1 :: PR 1 1 new commit(s)."
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("prs.json"));
        store.save(&[record(1, t0(), 1)]).unwrap();
        let source = FakeSource::new(vec![]);
        source.set(Err(()));
        let collector = Collector::new(&source, repos());
        let recorder = Recorder::default();

        let err = run_once(&collector, &store, &recorder, &layout()).await.unwrap_err();

        assert!(matches!(err, NotifierError::Collect(_)));
        assert!(recorder.sent.lock().unwrap().is_empty());
        let kept: Vec<u64> = store.load().unwrap().iter().map(|s| s.number).collect();
        assert_eq!(kept, vec![1]);
    }

    #[tokio::test]
    async fn test_closed_prs_leave_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("prs.json"));
        store.save(&[record(1, t0(), 1), record(2, t0(), 1)]).unwrap();
        let source = FakeSource::new(vec![record(2, t0(), 1)]);
        let collector = Collector::new(&source, repos());
        let recorder = Recorder::default();

        let outcome = run_once(&collector, &store, &recorder, &layout()).await.unwrap();

        assert_eq!(outcome.delivered, None);
        let kept: Vec<u64> = store.load().unwrap().iter().map(|s| s.number).collect();
        assert_eq!(kept, vec![2]);
    }
}
