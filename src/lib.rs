//! Content Scanner - incremental risk marking for live documents
//!
//! This crate scans a continuously changing document tree (a rendered page,
//! or an equivalent accessibility tree) for text worth checking, sends unseen
//! text to a remote risk-classification service, and marks content the
//! service considers risky:
//!
//! - **Extraction**: structural matchers plus a text-density fallback propose
//!   candidate nodes within the visible viewport
//! - **Dedup**: every node and every normalized text is submitted at most once
//!   per session
//! - **Classification**: concurrent, time-bounded calls to the service
//! - **Annotation**: markers for caution/danger results, alerts for
//!   high-confidence danger
//!
//! # Architecture
//!
//! A [`ScanOrchestrator`] runs one pass at a time, triggered by a timer, by
//! settled scrolling or insertions reported by the host, or on demand. Hosts
//! plug in through the [`DocumentTree`], [`MarkerSurface`], [`AlertSink`] and
//! [`Classifier`] traits.

pub mod annotator;
pub mod classifier;
pub mod config;
pub mod extractor;
pub mod filter;
pub mod ledger;
pub mod orchestrator;
pub mod session;
pub mod text;
pub mod tree;
pub mod types;
pub mod watcher;

// Re-export commonly used types
pub use annotator::{Alert, AlertSink, Annotator, LogAlertSink, MarkerSurface};
pub use classifier::{
    prepare_content, ClassificationRequest, Classifier, ContentType, HttpClassifier, PolicyDecision,
    RequestMetadata, ThresholdPolicy,
};
pub use config::{Config, ConfigError, SensitivityTier};
pub use extractor::{CandidateExtractor, ExtractionStats, MatcherSet, StructuralMatcher};
pub use filter::FilterPolicy;
pub use ledger::{DedupLedger, DedupResult};
pub use orchestrator::{PassOutcome, PassReport, ScanCounters, ScanOrchestrator, ScanStatus};
pub use session::ScanSession;
pub use tree::{AggregateText, DocumentTree, MemoryTree, NodeInfo, NodeSpec, TextLimits, TreeEvent};
pub use types::{
    AnnotationError, Candidate, ClassificationError, ClassificationResult, ExtractionError, Marker,
    NodeBounds, NodeId, RiskLevel, ScanTrigger, Viewport,
};
pub use watcher::ChangeWatcher;
