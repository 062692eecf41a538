//! Change watching with debounce.
//!
//! Turns a stream of [`TreeEvent`]s into settled scan triggers. Every batch of
//! inserted content (re)starts the mutation debounce; every scroll (re)starts
//! the scroll debounce. Removals, attribute changes and insertions made only
//! of this engine's own annotations are ignored.

use crate::tree::TreeEvent;
use crate::types::ScanTrigger;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

pub struct ChangeWatcher {
    mutation_debounce: Duration,
    scroll_debounce: Duration,
    mutation_deadline: Option<Instant>,
    scroll_deadline: Option<Instant>,
    /// Nodes inserted since the mutation debounce last fired
    pending_insertions: usize,
}

impl ChangeWatcher {
    pub fn new(mutation_debounce: Duration, scroll_debounce: Duration) -> Self {
        Self {
            mutation_debounce,
            scroll_debounce,
            mutation_deadline: None,
            scroll_deadline: None,
            pending_insertions: 0,
        }
    }

    /// Feed one host event. Returns `true` if a debounce was (re)started.
    pub fn observe(&mut self, event: &TreeEvent) -> bool {
        match event {
            TreeEvent::Inserted { count, annotation_only } => {
                if *annotation_only || *count == 0 {
                    trace!("Ignoring insertion of {} annotation nodes", count);
                    return false;
                }
                self.pending_insertions += count;
                self.mutation_deadline = Some(Instant::now() + self.mutation_debounce);
                true
            }
            TreeEvent::Scrolled { .. } => {
                self.scroll_deadline = Some(Instant::now() + self.scroll_debounce);
                true
            }
            TreeEvent::Removed { .. } | TreeEvent::AttributesChanged { .. } => false,
        }
    }

    /// Earliest pending deadline and the trigger it will produce
    pub fn next_deadline(&self) -> Option<(Instant, ScanTrigger)> {
        let mutation = self
            .mutation_deadline
            .map(|at| (at, ScanTrigger::MutationSettled));
        let scroll = self.scroll_deadline.map(|at| (at, ScanTrigger::ScrollSettled));

        match (mutation, scroll) {
            (Some(m), Some(s)) => Some(if s.0 < m.0 { s } else { m }),
            (m, s) => m.or(s),
        }
    }

    /// Wait for the earliest debounce to settle. Pends forever when idle.
    ///
    /// Cancel safe: state only changes after the deadline has passed.
    pub async fn next_due(&mut self) -> ScanTrigger {
        let Some((deadline, trigger)) = self.next_deadline() else {
            return std::future::pending().await;
        };

        tokio::time::sleep_until(deadline).await;

        match trigger {
            ScanTrigger::MutationSettled => {
                trace!("Mutations settled after {} insertions", self.pending_insertions);
                self.mutation_deadline = None;
                self.pending_insertions = 0;
            }
            _ => self.scroll_deadline = None,
        }
        trigger
    }

    /// Drop any pending debounce
    pub fn reset(&mut self) {
        self.mutation_deadline = None;
        self.scroll_deadline = None;
        self.pending_insertions = 0;
    }

    pub fn pending_insertions(&self) -> usize {
        self.pending_insertions
    }

    pub fn is_idle(&self) -> bool {
        self.mutation_deadline.is_none() && self.scroll_deadline.is_none()
    }
}

impl Default for ChangeWatcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(1000))
    }
}
