// src/core/error.rs

use crate::core::models::ScanStatus;
use std::time::Duration;
use thiserror::Error;

/// Orchestrator-level faults. Returned synchronously to the caller of the
/// triggering operation; never raised from inside a running scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid scan target: {0}")]
    InvalidTarget(String),

    #[error("a scan is already running for target '{0}'")]
    AlreadyRunning(String),

    #[error("no scan modules selected")]
    NoModulesSelected,

    #[error("scan has not reached a terminal state (status: {0})")]
    IncompleteRun(ScanStatus),
}

/// A fault inside a single scan module. Isolated by the orchestrator and
/// recorded as data; the run continues with the next phase.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("module timed out after {0:?}")]
    Timeout(Duration),
}

/// A failure of the external summary-generation collaborator. Always
/// absorbed into a fallback summary, never surfaced as a compile failure.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summary generation failed: {0}")]
    Generation(String),

    #[error("summary generation timed out")]
    Timeout,
}
