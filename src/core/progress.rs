// src/core/progress.rs

use crate::core::models::{Progress, ScanStatus};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Publishes run progress to observers.
///
/// Backed by a watch channel: every transition is visible to all current
/// subscribers synchronously with the state change, and a subscriber joining
/// late reads the last-known state before any future events.
///
/// State machine: idle -> running -> {running, completed, stopped, error}.
/// Terminal states accept no further transitions. The fraction is clamped so
/// it never decreases while the run is active.
#[derive(Debug)]
pub struct ProgressTracker {
    tx: watch::Sender<Progress>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Progress::idle());
        Self { tx }
    }

    /// Subscribes an observer. The receiver's initial value is the current
    /// state, so late subscribers replay it rather than missing it.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Progress {
        self.tx.borrow().clone()
    }

    /// idle -> running.
    pub fn start(&self, phase: &str) {
        self.tx.send_modify(|p| {
            if p.status != ScanStatus::Idle {
                warn!(status = %p.status, "ignoring start on non-idle tracker");
                return;
            }
            p.status = ScanStatus::Running;
            p.phase = phase.to_string();
            p.fraction = 0.0;
        });
    }

    /// running -> running: phase advance. Publishes the new phase label and
    /// completion fraction before any finding from that phase is visible.
    pub fn advance(&self, phase: &str, fraction: f64) {
        self.tx.send_modify(|p| {
            if p.status != ScanStatus::Running {
                warn!(status = %p.status, phase, "ignoring advance on non-running tracker");
                return;
            }
            p.phase = phase.to_string();
            // Monotone while running.
            p.fraction = fraction.clamp(p.fraction, 1.0);
            debug!(phase = %p.phase, fraction = p.fraction, "phase advanced");
        });
    }

    /// running -> completed. Fraction is forced to exactly 1.0.
    pub fn complete(&self) {
        self.tx.send_modify(|p| {
            if p.status != ScanStatus::Running {
                warn!(status = %p.status, "ignoring complete on non-running tracker");
                return;
            }
            p.status = ScanStatus::Completed;
            p.phase = "Scan completed".to_string();
            p.fraction = 1.0;
        });
    }

    /// running -> stopped. The fraction freezes at its last value.
    pub fn stop(&self) {
        self.tx.send_modify(|p| {
            if p.status != ScanStatus::Running {
                warn!(status = %p.status, "ignoring stop on non-running tracker");
                return;
            }
            p.status = ScanStatus::Stopped;
            p.phase = "Scan stopped".to_string();
        });
    }

    /// running -> error, for orchestrator-level fatal faults.
    pub fn fail(&self, reason: &str) {
        self.tx.send_modify(|p| {
            if p.status != ScanStatus::Running {
                warn!(status = %p.status, reason, "ignoring fail on non-running tracker");
                return;
            }
            p.status = ScanStatus::Error;
            p.phase = reason.to_string();
        });
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
