//! Shared fixtures for integration tests.

#![allow(dead_code)]

use content_scanner::{
    Alert, AlertSink, ClassificationError, ClassificationResult, Classifier, Config, MemoryTree,
    RequestMetadata, RiskLevel, ScanOrchestrator,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// How the scripted classifier answers a matching text
#[derive(Clone)]
pub enum Reply {
    Result(ClassificationResult),
    Fail(ClassificationError),
    /// Never answers; the caller's timeout decides
    Hang,
}

/// Classifier answering from a list of (substring, reply) rules
pub struct ScriptedClassifier {
    rules: Vec<(String, Reply)>,
    fallback: Reply,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedClassifier {
    pub fn new(fallback: ClassificationResult) -> Self {
        Self {
            rules: Vec::new(),
            fallback: Reply::Result(fallback),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn safe() -> Self {
        Self::new(ClassificationResult::new(RiskLevel::Safe, 0.95))
    }

    pub fn on(mut self, fragment: &str, reply: Reply) -> Self {
        self.rules.push((fragment.to_lowercase(), reply));
        self
    }

    pub fn respond(self, fragment: &str, level: RiskLevel, confidence: f64) -> Self {
        self.on(fragment, Reply::Result(ClassificationResult::new(level, confidence)))
    }

    /// Block every call until permits are added to the returned semaphore
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn reply_for(&self, content: &str) -> Reply {
        let lowered = content.to_lowercase();
        self.rules
            .iter()
            .find(|(fragment, _)| lowered.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        content: &str,
        _metadata: &RequestMetadata,
    ) -> Result<ClassificationResult, ClassificationError> {
        self.calls.lock().unwrap().push(content.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.unwrap();
            permit.forget();
        }

        match self.reply_for(content) {
            Reply::Result(result) => Ok(result),
            Reply::Fail(e) => Err(e),
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Alert sink that records everything it receives
#[derive(Default)]
pub struct RecordingSink {
    alerts: Mutex<Vec<Alert>>,
    spoken: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl AlertSink for RecordingSink {
    fn notify(&self, alert: &Alert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }

    fn speak(&self, utterance: &str) {
        self.spoken.lock().unwrap().push(utterance.to_string());
    }
}

pub struct Harness {
    pub tree: Arc<MemoryTree>,
    pub classifier: Arc<ScriptedClassifier>,
    pub sink: Arc<RecordingSink>,
    pub scanner: ScanOrchestrator,
}

pub fn harness(classifier: ScriptedClassifier) -> Harness {
    harness_with_config(classifier, Config::default())
}

pub fn harness_with_config(classifier: ScriptedClassifier, config: Config) -> Harness {
    let tree = Arc::new(MemoryTree::new());
    let classifier = Arc::new(classifier);
    let sink = Arc::new(RecordingSink::default());
    let scanner = ScanOrchestrator::new(
        &config,
        tree.clone(),
        tree.clone(),
        sink.clone(),
        classifier.clone(),
    );

    Harness {
        tree,
        classifier,
        sink,
        scanner,
    }
}

/// Yield until the classifier has `count` calls in flight
pub async fn wait_for_in_flight(classifier: &ScriptedClassifier, count: usize) {
    for _ in 0..10_000 {
        if classifier.in_flight() >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("classifier never reached {} calls in flight", count);
}
