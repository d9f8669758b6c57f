// src/core/mod.rs

// The `core` module is the whole scanning engine: everything here is
// UI-agnostic and drives scans purely through the orchestrator's handles.

/// Concurrency-safe, append-only store of findings with severity tallies.
pub mod aggregator;

/// Cooperative cancellation token shared between a run and its modules.
pub mod cancel;

/// Tunables for a scan run and the shared HTTP client they configure.
pub mod config;

/// Error taxonomy: fatal start errors, recoverable module errors, and
/// summary-generation errors.
pub mod error;

/// Repository of known issues: maps stable finding codes to classified
/// titles, severities, scores and remediation guidance.
pub mod knowledge_base;

/// Data structures shared across the engine, such as `Finding`, `Severity`,
/// `Progress` and the final `Report`.
pub mod models;

/// Drives a scan run: module dispatch in phase order, timeouts, failure
/// isolation and the per-run handle.
pub mod orchestrator;

/// Publishes phase and fraction updates over a watch channel.
pub mod progress;

/// Compiles a terminal snapshot into the report artifact, delegating the
/// narrative summary to a pluggable generator.
pub mod report;

/// The scan modules themselves and the trait they implement.
pub mod scanner;
