//! Background runs for interactive front ends.
//!
//! A [`Session`] counts the candidates up front (so a progress bar knows its
//! length), then drives the engine on a worker thread and hands events to the
//! foreground over a zero-capacity channel. The worker blocks on each send
//! until the foreground takes the event, so it is never more than one file
//! ahead of what the user has seen, and a cancellation requested after event
//! N stops the run after at most N + 1 files.

use crate::engine::{CancelToken, Engine, OutcomeEvent};
use crate::stats::{Stats, StatsSnapshot};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Candidates found before the run started.
    pub total: usize,
    /// Events received by the foreground, terminal event included.
    pub events: usize,
    /// True if the run ended with [`OutcomeEvent::Aborted`].
    pub cancelled: bool,
    pub stats: StatsSnapshot,
}

/// Starts engine runs on a background worker.
pub struct Session;

impl Session {
    /// Scans the engine's base, then starts the run on a worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn spawn(engine: Engine, cancel: CancelToken) -> io::Result<SessionHandle> {
        let candidates: Vec<PathBuf> = engine.candidates().collect();
        Self::spawn_with(engine, candidates, cancel)
    }

    /// Starts a run over an already collected candidate list.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn spawn_with(
        engine: Engine,
        candidates: Vec<PathBuf>,
        cancel: CancelToken,
    ) -> io::Result<SessionHandle> {
        let total = candidates.len();
        let stats = Arc::clone(engine.stats());
        let (tx, rx) = mpsc::sync_channel(0);

        let worker_cancel = cancel.clone();
        let worker = thread::Builder::new()
            .name("fileorg-worker".to_string())
            .spawn(move || {
                for event in engine.run(Some(candidates), Some(worker_cancel)) {
                    if tx.send(event).is_err() {
                        tracing::debug!("Session receiver dropped, stopping worker");
                        break;
                    }
                }
            })?;

        tracing::info!("Session started with {} candidates", total);

        Ok(SessionHandle {
            total,
            events: rx,
            stats,
            cancel,
            worker: Some(worker),
            received: 0,
            cancelled: false,
        })
    }
}

/// Foreground side of a running session.
pub struct SessionHandle {
    total: usize,
    events: Receiver<OutcomeEvent>,
    stats: Arc<Stats>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
    received: usize,
    cancelled: bool,
}

impl SessionHandle {
    /// Number of candidates the run will go through.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Live counters; safe to poll while the worker runs.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Asks the worker to stop before its next file.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Blocks until the next event; `None` once the run is over.
    pub fn next_event(&mut self) -> Option<OutcomeEvent> {
        let event = self.events.recv().ok()?;
        self.received += 1;
        if event == OutcomeEvent::Aborted {
            self.cancelled = true;
        }
        Some(event)
    }

    /// Drains remaining events, waits for the worker and reports.
    pub fn join(mut self) -> SessionReport {
        while self.next_event().is_some() {}

        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("Session worker panicked");
        }

        let report = SessionReport {
            total: self.total,
            events: self.received,
            cancelled: self.cancelled,
            stats: self.stats.snapshot(),
        };
        tracing::debug!(
            "Worker finished. Processed: {}, Skipped: {}, Excluded: {}, Errors: {}",
            report.stats.processed,
            report.stats.skipped,
            report.stats.excluded,
            report.stats.errored
        );
        report
    }
}

impl Iterator for SessionHandle {
    type Item = OutcomeEvent;

    fn next(&mut self) -> Option<OutcomeEvent> {
        self.next_event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunMode;
    use crate::rules::RuleTable;
    use crate::scanner::FilterConfig;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn engine(base: &Path, mode: RunMode) -> Engine {
        let rules = Arc::new(RuleTable::from_pairs([("Docs", vec![".txt"])]).unwrap());
        let filter = FilterConfig::new(false, false).excluding_categories(&rules);
        Engine::new(base, rules, filter, Arc::new(Stats::new()), mode)
    }

    #[test]
    fn test_session_counts_and_delivers_every_event() {
        let temp = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(temp.path().join(format!("note{}.txt", i)), b"x").unwrap();
        }

        let mut handle =
            Session::spawn(engine(temp.path(), RunMode::Simulate), CancelToken::new()).unwrap();
        assert_eq!(handle.total(), 5);

        let events: Vec<_> = handle.by_ref().collect();
        assert_eq!(events.len(), 6);
        assert!(events.last().unwrap().is_terminal());

        let report = handle.join();
        assert!(!report.cancelled);
        assert_eq!(report.events, 6);
        assert_eq!(report.stats.processed, 5);
    }

    #[test]
    fn test_session_cancellation_stops_worker() {
        let temp = TempDir::new().unwrap();
        for i in 0..20 {
            fs::write(temp.path().join(format!("note{:02}.txt", i)), b"x").unwrap();
        }

        let mut handle =
            Session::spawn(engine(temp.path(), RunMode::Move), CancelToken::new()).unwrap();
        for _ in 0..3 {
            assert!(handle.next_event().is_some());
        }
        handle.cancel();

        let report = handle.join();
        assert!(report.cancelled);
        assert!(report.stats.processed <= 4);
        assert!(report.stats.processed >= 3);
    }
}
