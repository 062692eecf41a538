//! Content Scanner - Main entry point
//!
//! Runs the scanner as a daemon over an in-memory document. Pass a text file
//! to seed the document: each blank-line separated block becomes a paragraph.

use content_scanner::{
    Config, DocumentTree, HttpClassifier, LogAlertSink, MemoryTree, NodeSpec, PassOutcome,
    ScanOrchestrator,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("Starting Content Scanner");
    info!("Configuration loaded from {:?}", Config::default_config_path());

    let tree = Arc::new(MemoryTree::new());
    if let Some(path) = std::env::args().nth(1) {
        let seeded = seed_document(&tree, &path)?;
        info!("Seeded document with {} paragraphs from {}", seeded, path);
    }
    let events = tree.subscribe(100);

    let classifier = Arc::new(HttpClassifier::new(&config.classification)?);
    info!("Classification service: {}", classifier.base_url());

    let scanner = ScanOrchestrator::new(
        &config,
        tree.clone(),
        tree.clone(),
        Arc::new(LogAlertSink),
        classifier,
    );

    if scanner.health_check().await {
        info!("✅ Classification service reachable");
    } else {
        warn!("⚠️  Classification service not reachable, classifications will fail until it is up");
    }

    if let PassOutcome::Completed(report) = scanner.force_scan().await {
        info!(
            "Initial scan: {} candidates, {} marked",
            report.candidates, report.markers_placed
        );
    }

    println!("Press Ctrl+C to stop");
    scanner
        .run(events, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await;

    let status = scanner.status().await;
    info!(
        "Processed {} nodes, {} markers, {} alerts over {} passes",
        status.processed_node_count,
        status.marker_count,
        status.counters.alerts_raised,
        status.counters.passes_completed
    );

    Ok(())
}

/// Load blank-line separated blocks as paragraphs, stacked vertically
fn seed_document(tree: &MemoryTree, path: &str) -> Result<usize, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let root = tree.root().ok_or("document has no root")?;

    let mut count = 0;
    for block in content.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        tree.append(root, NodeSpec::new("p").text(block).at_y(count as f64 * 60.0))?;
        count += 1;
    }
    Ok(count)
}
