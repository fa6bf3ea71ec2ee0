//! Monitor loop: poll, filter through the tracker, notify, sleep
//!
//! A PR is marked seen only after its notification was delivered. A failed
//! delivery leaves it unmarked so the next cycle retries it; marking first
//! would lose it for good, never marking would repeat it forever.

mod phase;

pub use phase::{MonitorPhase, PhaseTracker};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::record::PullRequestRecord;
use crate::source::{DeliveryOutcome, Notifier, PullRequestSource};
use crate::tracker::PrTracker;
use crate::{Error, Result};

/// What happened during one polling cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records returned by the source
    pub fetched: usize,
    /// Records on a target branch, within the per-cycle cap
    pub considered: usize,
    /// Considered records that were already seen
    pub skipped: usize,
    /// Notifications delivered (and marked seen)
    pub delivered: usize,
    /// Notifications that failed and stay eligible for retry
    pub failed: usize,
}

/// The polling loop and the state it owns
pub struct Monitor<S, N> {
    config: MonitorConfig,
    tracker: PrTracker,
    source: S,
    notifier: N,
    phases: PhaseTracker,
}

impl<S, N> Monitor<S, N>
where
    S: PullRequestSource,
    N: Notifier,
{
    pub fn new(config: MonitorConfig, tracker: PrTracker, source: S, notifier: N) -> Self {
        Self {
            config,
            tracker,
            source,
            notifier,
            phases: PhaseTracker::new(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn tracker(&self) -> &PrTracker {
        &self.tracker
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phases.current()
    }

    /// Run one fetch-filter-notify pass
    ///
    /// Returns the source's error unchanged; nothing is marked in that case.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let limit = self.config.max_prs_per_request();
        let branches = self.config.branches();

        debug!(?branches, limit, "Checking for new merged PRs");
        let records = self.source.fetch_recent_merged_prs(branches, limit).await?;

        let mut report = CycleReport {
            fetched: records.len(),
            ..Default::default()
        };

        let mut candidates: Vec<PullRequestRecord> = records
            .into_iter()
            .filter(|r| r.merged_into_any(branches))
            .collect();
        candidates.sort_by(|a, b| b.merged_at.cmp(&a.merged_at));
        candidates.truncate(limit);
        report.considered = candidates.len();

        for record in &candidates {
            if !self.tracker.is_new(record.id) {
                report.skipped += 1;
                continue;
            }

            match self.notifier.notify(record).await {
                DeliveryOutcome::Delivered => {
                    self.tracker.mark_seen(record.id);
                    report.delivered += 1;
                    info!(
                        number = record.number,
                        branch = %record.base_branch,
                        title = %record.title,
                        "Notification sent"
                    );
                }
                DeliveryOutcome::Failed { reason } => {
                    report.failed += 1;
                    warn!(
                        number = record.number,
                        reason = %reason,
                        "Failed to send notification, will retry next cycle"
                    );
                }
            }
        }

        if report.delivered > 0 || report.failed > 0 {
            info!(
                delivered = report.delivered,
                failed = report.failed,
                "Processed new merged PR(s)"
            );
        } else {
            debug!(fetched = report.fetched, "No new merged PRs found");
        }

        Ok(report)
    }

    /// Run one cycle, logging instead of returning errors
    pub async fn poll(&mut self) -> Option<CycleReport> {
        match self.run_cycle().await {
            Ok(report) => Some(report),
            Err(e) => {
                log_cycle_error(&e);
                None
            }
        }
    }

    /// Alternate polling and sleeping until `shutdown` fires or is dropped
    pub async fn run(&mut self, mut shutdown: mpsc::Receiver<()>) {
        let interval = self.config.polling_interval();
        info!(
            branches = ?self.config.branches(),
            interval_secs = interval.as_secs(),
            "Monitor loop starting"
        );

        loop {
            self.poll().await;

            self.enter(MonitorPhase::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.enter(MonitorPhase::Polling);
                }
                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.enter(MonitorPhase::Stopped);
        self.tracker.save();
        info!(tracked = self.tracker.seen_count(), "Monitor loop stopped");
    }

    fn enter(&mut self, phase: MonitorPhase) {
        if let Err(e) = self.phases.transition_to(phase) {
            error!(error = %e, "Unexpected monitor phase transition");
        }
    }
}

fn log_cycle_error(e: &Error) {
    if e.is_rate_limit() {
        warn!(
            error = %e,
            "GitHub API rate limit exceeded, skipping cycle. Consider increasing POLLING_INTERVAL"
        );
        return;
    }
    match e {
        Error::Access(msg) => error!(error = %msg, "Repository not accessible, skipping cycle"),
        Error::Network(msg) => warn!(error = %msg, "Network error, skipping cycle"),
        other => error!(error = %other, "Error in polling cycle, skipping"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::record;
    use crate::record::PrId;
    use async_trait::async_trait;
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct ScriptedSource {
        inner: Arc<SourceState>,
    }

    #[derive(Default)]
    struct SourceState {
        scripted: Mutex<VecDeque<Result<Vec<PullRequestRecord>>>>,
        fallback: Mutex<Vec<PullRequestRecord>>,
        calls: AtomicUsize,
        last_limit: AtomicUsize,
    }

    impl ScriptedSource {
        fn always(records: Vec<PullRequestRecord>) -> Self {
            let source = Self::default();
            *source.inner.fallback.lock().unwrap() = records;
            source
        }

        fn then(self, response: Result<Vec<PullRequestRecord>>) -> Self {
            self.inner.scripted.lock().unwrap().push_back(response);
            self
        }

        fn calls(&self) -> usize {
            self.inner.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PullRequestSource for ScriptedSource {
        async fn fetch_recent_merged_prs(
            &self,
            _branches: &[String],
            limit: usize,
        ) -> Result<Vec<PullRequestRecord>> {
            self.inner.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.last_limit.store(limit, Ordering::SeqCst);
            if let Some(next) = self.inner.scripted.lock().unwrap().pop_front() {
                return next;
            }
            Ok(self.inner.fallback.lock().unwrap().clone())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        inner: Arc<NotifierState>,
    }

    #[derive(Default)]
    struct NotifierState {
        failing: Mutex<HashSet<PrId>>,
        attempts: Mutex<Vec<PrId>>,
        delivered: Mutex<Vec<PrId>>,
    }

    impl RecordingNotifier {
        fn fail(&self, id: PrId) {
            self.inner.failing.lock().unwrap().insert(id);
        }

        fn recover(&self, id: PrId) {
            self.inner.failing.lock().unwrap().remove(&id);
        }

        fn delivered(&self) -> Vec<PrId> {
            self.inner.delivered.lock().unwrap().clone()
        }

        fn attempts(&self) -> Vec<PrId> {
            self.inner.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, record: &PullRequestRecord) -> DeliveryOutcome {
            self.inner.attempts.lock().unwrap().push(record.id);
            if self.inner.failing.lock().unwrap().contains(&record.id) {
                return DeliveryOutcome::failed("webhook returned 500");
            }
            self.inner.delivered.lock().unwrap().push(record.id);
            DeliveryOutcome::Delivered
        }
    }

    fn config(branches: &[&str], max: usize) -> MonitorConfig {
        MonitorConfig::new(branches.iter().copied(), 60, max).unwrap()
    }

    fn monitor(
        branches: &[&str],
        max: usize,
        source: &ScriptedSource,
        notifier: &RecordingNotifier,
    ) -> Monitor<ScriptedSource, RecordingNotifier> {
        Monitor::new(
            config(branches, max),
            PrTracker::in_memory(),
            source.clone(),
            notifier.clone(),
        )
    }

    #[tokio::test]
    async fn test_only_target_branch_is_notified() {
        let source = ScriptedSource::always(vec![record(1, "staging", 5), record(2, "main", 1)]);
        let notifier = RecordingNotifier::default();
        let mut m = monitor(&["staging"], 100, &source, &notifier);

        let report = m.run_cycle().await.unwrap();
        assert_eq!(notifier.delivered(), vec![1]);
        assert_eq!(report.fetched, 2);
        assert_eq!(report.considered, 1);
        assert!(m.tracker().is_new(2));
    }

    #[tokio::test]
    async fn test_caps_records_per_cycle() {
        let records = (1..=5).map(|i| record(i, "staging", i as i64)).collect();
        let source = ScriptedSource::always(records);
        let notifier = RecordingNotifier::default();
        let mut m = monitor(&["staging"], 2, &source, &notifier);

        let report = m.run_cycle().await.unwrap();
        assert_eq!(source.inner.last_limit.load(Ordering::SeqCst), 2);
        assert_eq!(report.considered, 2);
        // Most recent first: smaller minutes_ago is newer
        assert_eq!(notifier.attempts(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_same_pr_in_consecutive_polls_notified_once() {
        let source = ScriptedSource::always(vec![record(10, "staging", 0)]);
        let notifier = RecordingNotifier::default();
        let mut m = monitor(&["staging"], 100, &source, &notifier);

        m.run_cycle().await.unwrap();
        let second = m.run_cycle().await.unwrap();
        assert_eq!(notifier.delivered(), vec![10]);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.delivered, 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_stays_new_and_is_retried() {
        let source = ScriptedSource::always(vec![record(1, "staging", 0), record(2, "staging", 3)]);
        let notifier = RecordingNotifier::default();
        notifier.fail(1);
        let mut m = monitor(&["staging"], 100, &source, &notifier);

        let report = m.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert!(m.tracker().is_new(1));
        assert!(!m.tracker().is_new(2));

        notifier.recover(1);
        let report = m.run_cycle().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(notifier.delivered(), vec![2, 1]);
        assert!(!m.tracker().is_new(1));
    }

    #[tokio::test]
    async fn test_access_error_notifies_nothing() {
        let source = ScriptedSource::always(vec![record(1, "staging", 0)])
            .then(Err(Error::Access("Repository acme/widgets not found".into())));
        let notifier = RecordingNotifier::default();
        let mut m = monitor(&["staging"], 100, &source, &notifier);

        let err = m.run_cycle().await.unwrap_err();
        assert!(matches!(err, Error::Access(_)));
        assert!(notifier.attempts().is_empty());
        assert!(m.tracker().is_new(1));

        // Next cycle recovers
        assert!(m.poll().await.is_some());
        assert_eq!(notifier.delivered(), vec![1]);
    }

    #[tokio::test]
    async fn test_poll_swallows_rate_limit() {
        let source = ScriptedSource::default().then(Err(Error::RateLimited("resets soon".into())));
        let notifier = RecordingNotifier::default();
        let mut m = monitor(&["staging"], 100, &source, &notifier);
        assert!(m.poll().await.is_none());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_errors_and_polls_again() {
        let source = ScriptedSource::always(vec![record(1, "staging", 0)])
            .then(Err(Error::Access("forbidden".into())))
            .then(Err(Error::Network("connection reset".into())));
        let notifier = RecordingNotifier::default();
        let mut m = monitor(&["staging"], 100, &source, &notifier);

        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            m.run(rx).await;
            m
        });

        // Paused clock auto-advances through each 60s sleep
        while source.calls() < 4 {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        tx.send(()).await.unwrap();
        let m = task.await.unwrap();

        assert_eq!(m.phase(), MonitorPhase::Stopped);
        assert_eq!(notifier.delivered(), vec![1]);
        assert!(!m.tracker().is_new(1));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let source = ScriptedSource::default();
        let notifier = RecordingNotifier::default();
        let mut m = Monitor::new(
            MonitorConfig::new(["staging"], 3600, 10).unwrap(),
            PrTracker::in_memory(),
            source.clone(),
            notifier,
        );

        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            m.run(rx).await;
            m
        });
        while source.calls() < 1 {
            tokio::task::yield_now().await;
        }
        tx.send(()).await.unwrap();

        let m = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("monitor should stop promptly")
            .unwrap();
        assert_eq!(m.phase(), MonitorPhase::Stopped);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_loop() {
        let source = ScriptedSource::default();
        let notifier = RecordingNotifier::default();
        let mut m = monitor(&["staging"], 10, &source, &notifier);
        let (tx, rx) = mpsc::channel::<()>(1);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), m.run(rx))
            .await
            .expect("closed channel should stop the loop");
        assert_eq!(m.phase(), MonitorPhase::Stopped);
    }
}
