//! Scan orchestration.
//!
//! This module drives scan passes over the host document:
//! - Single-flight: a pass requested while another is running is dropped
//! - Per pass: extract, commit to the ledger, classify with bounded
//!   concurrency, then apply markers and alerts in arrival order
//! - Results committed before a clear are discarded
//! - The run loop merges timer ticks, debounced host changes and shutdown
//!
//! [`ScanOrchestrator`] is a cheap `Clone` handle; presentation callers use
//! the same handle the run loop drives.

use crate::annotator::{AlertSink, Annotator, MarkerSurface};
use crate::classifier::{Classifier, RequestMetadata, ThresholdPolicy};
use crate::config::{Config, TimingConfig};
use crate::extractor::CandidateExtractor;
use crate::ledger::DedupResult;
use crate::session::ScanSession;
use crate::tree::{DocumentTree, TreeEvent};
use crate::types::{Candidate, ClassificationError, ClassificationResult, NodeId, ScanTrigger};
use crate::watcher::ChangeWatcher;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

/// Result of requesting a pass
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Completed(PassReport),
    /// Another pass was already running
    Dropped,
    /// Automatic trigger while auto-scan is disabled
    Skipped,
}

impl PassOutcome {
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// What one completed pass did
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub trigger: ScanTrigger,
    /// Candidates proposed by the extractor
    pub candidates: usize,
    /// Candidates committed and sent for classification
    pub submitted: usize,
    /// Candidates skipped because their text was already submitted
    pub duplicates: usize,
    /// Results discarded because the session was cleared meanwhile
    pub stale: usize,
    pub classified: usize,
    pub failures: usize,
    pub markers_placed: usize,
    pub alerts_raised: usize,
    pub duration: Duration,
}

impl PassReport {
    fn new(trigger: ScanTrigger) -> Self {
        Self {
            trigger,
            candidates: 0,
            submitted: 0,
            duplicates: 0,
            stale: 0,
            classified: 0,
            failures: 0,
            markers_placed: 0,
            alerts_raised: 0,
            duration: Duration::ZERO,
        }
    }
}

/// Lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounters {
    pub passes_completed: u64,
    pub passes_dropped: u64,
    pub classifications_sent: u64,
    pub classification_failures: u64,
    pub markers_placed: u64,
    pub alerts_raised: u64,
}

#[derive(Default)]
struct Counters {
    passes_completed: AtomicU64,
    passes_dropped: AtomicU64,
    classifications_sent: AtomicU64,
    classification_failures: AtomicU64,
    markers_placed: AtomicU64,
    alerts_raised: AtomicU64,
}

impl Counters {
    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ScanCounters {
        ScanCounters {
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            passes_dropped: self.passes_dropped.load(Ordering::Relaxed),
            classifications_sent: self.classifications_sent.load(Ordering::Relaxed),
            classification_failures: self.classification_failures.load(Ordering::Relaxed),
            markers_placed: self.markers_placed.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
        }
    }
}

/// Orchestrator status
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStatus {
    pub is_scanning: bool,
    pub auto_scan_enabled: bool,
    pub processed_node_count: usize,
    pub fingerprint_count: usize,
    pub marker_count: usize,
    pub counters: ScanCounters,
}

/// Resets the scanning flag when a pass ends, however it ends
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScanGuard(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    tree: Arc<dyn DocumentTree>,
    classifier: Arc<dyn Classifier>,
    extractor: CandidateExtractor,
    policy: ThresholdPolicy,
    metadata: RequestMetadata,
    timeout: Duration,
    limiter: Arc<Semaphore>,
    timing: TimingConfig,
    session: Mutex<ScanSession>,
    scanning: AtomicBool,
    auto_scan: AtomicBool,
    counters: Counters,
}

/// Scan orchestrator handle
#[derive(Clone)]
pub struct ScanOrchestrator {
    inner: Arc<Inner>,
}

impl ScanOrchestrator {
    pub fn new(
        config: &Config,
        tree: Arc<dyn DocumentTree>,
        surface: Arc<dyn MarkerSurface>,
        alerts: Arc<dyn AlertSink>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let annotator = Annotator::new(surface, alerts, config.alerts.voice_alerts_enabled);
        let extractor = CandidateExtractor::with_config(config.extraction.clone(), config.filter.clone());

        Self {
            inner: Arc::new(Inner {
                tree,
                classifier,
                extractor,
                policy: ThresholdPolicy::new(config.thresholds),
                metadata: RequestMetadata::from_config(&config.classification),
                timeout: config.classification.timeout(),
                limiter: Arc::new(Semaphore::new(config.classification.max_concurrent.max(1))),
                timing: config.timing.clone(),
                session: Mutex::new(ScanSession::new(annotator)),
                scanning: AtomicBool::new(false),
                auto_scan: AtomicBool::new(config.general.auto_scan_enabled),
                counters: Counters::default(),
            }),
        }
    }

    /// Request a pass. Automatic triggers are skipped while auto-scan is off;
    /// any trigger is dropped while another pass is running.
    pub async fn request_pass(&self, trigger: ScanTrigger) -> PassOutcome {
        if trigger.is_automatic() && !self.is_auto_scan_enabled() {
            trace!("Auto-scan disabled, skipping {} pass", trigger.as_str());
            return PassOutcome::Skipped;
        }

        let Some(_guard) = ScanGuard::acquire(&self.inner.scanning) else {
            debug!("Pass already running, dropping {} trigger", trigger.as_str());
            self.inner.counters.passes_dropped.fetch_add(1, Ordering::Relaxed);
            return PassOutcome::Dropped;
        };

        let report = self.run_pass(trigger).await;
        self.inner.counters.passes_completed.fetch_add(1, Ordering::Relaxed);
        PassOutcome::Completed(report)
    }

    /// Scan now, regardless of the auto-scan setting
    pub async fn force_scan(&self) -> PassOutcome {
        info!("On-demand scan requested");
        self.request_pass(ScanTrigger::OnDemand).await
    }

    async fn run_pass(&self, trigger: ScanTrigger) -> PassReport {
        let inner = &self.inner;
        let started = Instant::now();
        let mut report = PassReport::new(trigger);

        // Commit every accepted candidate before anything is dispatched
        let (accepted, epoch) = {
            let mut session = inner.session.lock().await;
            let epoch = session.epoch();
            let candidates = inner.extractor.extract(inner.tree.as_ref(), &session.ledger);
            report.candidates = candidates.len();

            let accepted: Vec<Candidate> = candidates
                .into_iter()
                .filter(|candidate| match session.ledger.check(candidate.node, &candidate.text) {
                    DedupResult::New => true,
                    DedupResult::KnownFingerprint => {
                        report.duplicates += 1;
                        false
                    }
                    DedupResult::KnownNode => false,
                })
                .collect();
            (accepted, epoch)
        };

        report.submitted = accepted.len();
        Counters::add(&inner.counters.classifications_sent, accepted.len());

        let mut tasks = JoinSet::new();
        for candidate in accepted {
            let classifier = inner.classifier.clone();
            let metadata = inner.metadata.clone();
            let timeout = inner.timeout;
            let limiter = inner.limiter.clone();
            tasks.spawn(async move {
                // The deadline starts once a slot is free
                let result = match limiter.acquire_owned().await {
                    Ok(_permit) => {
                        classify_bounded(classifier.as_ref(), &candidate.text, &metadata, timeout).await
                    }
                    Err(_) => Err(ClassificationError::Transport(
                        "classification slots closed".to_string(),
                    )),
                };
                (candidate.node, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((node, Ok(result))) => {
                    report.classified += 1;
                    self.apply(node, &result, epoch, &mut report).await;
                }
                Ok((node, Err(e))) => {
                    // The node stays processed; no retry this session
                    warn!("Classification failed for {}: {}", node, e);
                    report.failures += 1;
                }
                Err(e) => {
                    error!("Classification task failed: {}", e);
                    report.failures += 1;
                }
            }
        }

        Counters::add(&inner.counters.classification_failures, report.failures);
        Counters::add(&inner.counters.markers_placed, report.markers_placed);
        Counters::add(&inner.counters.alerts_raised, report.alerts_raised);

        report.duration = started.elapsed();
        if report.submitted > 0 {
            info!(
                "{} pass: {} submitted, {} failed, {} marked, {} alerts ({:?})",
                trigger.as_str(),
                report.submitted,
                report.failures,
                report.markers_placed,
                report.alerts_raised,
                report.duration
            );
        } else {
            debug!("{} pass: nothing new ({} candidates)", trigger.as_str(), report.candidates);
        }
        report
    }

    async fn apply(&self, node: NodeId, result: &ClassificationResult, epoch: u64, report: &mut PassReport) {
        let decision = self.inner.policy.evaluate(result);
        if !decision.place_marker && !decision.raise_alert {
            trace!("{} classified {} ({:.2}), no action", node, result.risk_level, result.confidence);
            return;
        }

        let mut session = self.inner.session.lock().await;
        if !session.is_current(epoch) {
            debug!("Session cleared while {} was classifying, discarding result", node);
            report.stale += 1;
            return;
        }
        if decision.place_marker && session.try_mark(node, result, result.risk_level) {
            report.markers_placed += 1;
        }
        if decision.raise_alert {
            session.annotator.raise_alert(Some(node), result);
            report.alerts_raised += 1;
        }
    }

    /// Classify arbitrary text and return the raw result. No markers, alerts
    /// or ledger entries.
    pub async fn analyze_text(&self, content: &str) -> Result<ClassificationResult, ClassificationError> {
        let inner = &self.inner;
        classify_bounded(inner.classifier.as_ref(), content, &inner.metadata, inner.timeout).await
    }

    /// Forget processed content and remove every marker. Returns markers removed.
    pub async fn clear_all_markers(&self) -> usize {
        let mut session = self.inner.session.lock().await;
        session.clear()
    }

    /// Flip auto-scan, returning the new state
    pub fn toggle_auto_scan(&self) -> bool {
        let enabled = !self.inner.auto_scan.fetch_xor(true, Ordering::AcqRel);
        info!("Auto-scan {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    pub fn set_auto_scan(&self, enabled: bool) {
        self.inner.auto_scan.store(enabled, Ordering::Release);
    }

    pub fn is_auto_scan_enabled(&self) -> bool {
        self.inner.auto_scan.load(Ordering::Acquire)
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.scanning.load(Ordering::Acquire)
    }

    pub async fn set_voice_alerts(&self, enabled: bool) {
        self.inner.session.lock().await.annotator.set_voice_alerts(enabled);
    }

    pub async fn status(&self) -> ScanStatus {
        let session = self.inner.session.lock().await;
        ScanStatus {
            is_scanning: self.is_scanning(),
            auto_scan_enabled: self.is_auto_scan_enabled(),
            processed_node_count: session.ledger.processed_node_count(),
            fingerprint_count: session.ledger.fingerprint_count(),
            marker_count: session.annotator.marker_count(),
            counters: self.inner.counters.snapshot(),
        }
    }

    pub fn counters(&self) -> ScanCounters {
        self.inner.counters.snapshot()
    }

    pub async fn health_check(&self) -> bool {
        self.inner.classifier.health_check().await
    }

    /// Start a pass in the background; a busy orchestrator drops it
    fn spawn_pass(&self, trigger: ScanTrigger) {
        let this = self.clone();
        tokio::spawn(async move {
            match this.request_pass(trigger).await {
                PassOutcome::Completed(report) => trace!("{} pass done in {:?}", trigger.as_str(), report.duration),
                outcome => trace!("{} trigger: {:?}", trigger.as_str(), outcome),
            }
        });
    }

    /// Drive timer and host-change triggers until `shutdown` resolves
    pub async fn run<F>(&self, mut events: mpsc::Receiver<TreeEvent>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let timing = &self.inner.timing;
        let interval = timing.scan_interval();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut watcher = ChangeWatcher::new(timing.mutation_debounce(), timing.scroll_debounce());
        let mut events_open = true;
        tokio::pin!(shutdown);

        info!("Scanner running with {:?} interval", interval);

        loop {
            let trigger = tokio::select! {
                _ = &mut shutdown => {
                    info!("Scanner stopping");
                    break;
                }
                _ = ticker.tick() => ScanTrigger::TimerTick,
                event = events.recv(), if events_open => {
                    match event {
                        Some(event) => {
                            if self.is_auto_scan_enabled() {
                                watcher.observe(&event);
                            }
                        }
                        None => {
                            debug!("Host event stream closed");
                            events_open = false;
                        }
                    }
                    continue;
                }
                trigger = watcher.next_due() => trigger,
            };

            self.spawn_pass(trigger);
        }
    }
}

/// Classify with a deadline; an expired deadline is a transport failure
async fn classify_bounded(
    classifier: &dyn Classifier,
    content: &str,
    metadata: &RequestMetadata,
    timeout: Duration,
) -> Result<ClassificationResult, ClassificationError> {
    match tokio::time::timeout(timeout, classifier.classify(content, metadata)).await {
        Ok(result) => result,
        Err(_) => Err(ClassificationError::timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotator::LogAlertSink;
    use crate::tree::{MemoryTree, NodeSpec};
    use crate::types::RiskLevel;

    struct FixedClassifier(ClassificationResult);

    #[async_trait::async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(
            &self,
            _content: &str,
            _metadata: &RequestMetadata,
        ) -> Result<ClassificationResult, ClassificationError> {
            Ok(self.0.clone())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn orchestrator(tree: Arc<MemoryTree>, result: ClassificationResult) -> ScanOrchestrator {
        ScanOrchestrator::new(
            &Config::default(),
            tree.clone(),
            tree,
            Arc::new(LogAlertSink),
            Arc::new(FixedClassifier(result)),
        )
    }

    #[test]
    fn test_scan_guard_single_flight() {
        let flag = AtomicBool::new(false);
        let guard = ScanGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(ScanGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(ScanGuard::acquire(&flag).is_some());
    }

    #[tokio::test]
    async fn test_toggle_auto_scan() {
        let tree = Arc::new(MemoryTree::new());
        let scanner = orchestrator(tree, ClassificationResult::new(RiskLevel::Safe, 0.9));

        assert!(scanner.is_auto_scan_enabled());
        assert!(!scanner.toggle_auto_scan());
        assert_eq!(scanner.request_pass(ScanTrigger::TimerTick).await, PassOutcome::Skipped);
        // On-demand passes still run
        assert!(matches!(scanner.force_scan().await, PassOutcome::Completed(_)));
        assert!(scanner.toggle_auto_scan());
    }

    #[tokio::test]
    async fn test_pass_marks_and_counts() {
        let tree = Arc::new(MemoryTree::new());
        let root = tree.root().unwrap();
        let p = tree
            .append(root, NodeSpec::new("p").text("Your electricity will be cut tonight, pay now"))
            .unwrap();
        let scanner = orchestrator(tree.clone(), ClassificationResult::new(RiskLevel::Danger, 0.9));

        let report = scanner.force_scan().await.report().cloned().unwrap();
        assert_eq!(report.submitted, 1);
        assert_eq!(report.markers_placed, 1);
        assert_eq!(report.alerts_raised, 1);
        assert_eq!(tree.marker_on(p), Some(RiskLevel::Danger));

        let status = scanner.status().await;
        assert!(!status.is_scanning);
        assert_eq!(status.processed_node_count, 1);
        assert_eq!(status.marker_count, 1);
        assert_eq!(status.counters.passes_completed, 1);
        assert_eq!(status.counters.classifications_sent, 1);
        assert_eq!(status.counters.alerts_raised, 1);
    }

    #[tokio::test]
    async fn test_analyze_text_has_no_side_effects() {
        let tree = Arc::new(MemoryTree::new());
        let scanner = orchestrator(tree.clone(), ClassificationResult::new(RiskLevel::Danger, 0.99));

        let result = scanner.analyze_text("Send your OTP to this number").await.unwrap();
        assert_eq!(result.risk_level, RiskLevel::Danger);

        let status = scanner.status().await;
        assert_eq!(status.processed_node_count, 0);
        assert_eq!(status.counters, ScanCounters::default());
        assert_eq!(tree.marker_count(), 0);
    }
}
