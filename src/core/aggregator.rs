// src/core/aggregator.rs

use crate::core::models::{Finding, FindingKind, ModuleFailure, ModuleId, Severity};
use std::collections::HashSet;
use std::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Inner {
    findings: Vec<Finding>,
    seen: HashSet<(FindingKind, String, String)>,
    // One running tally per severity tier, maintained on ingest so counts
    // never require a rescan of the full set.
    tallies: [usize; 5],
    errors: Vec<ModuleFailure>,
}

/// Append-only store of findings for one run.
///
/// Safe under concurrent ingestion from modules probing in parallel; readers
/// observe consistent snapshots. Findings are never mutated or removed once
/// stored, and insertion order is discovery order.
#[derive(Default)]
pub struct FindingStore {
    inner: RwLock<Inner>,
}

impl FindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests one finding. Duplicates (same kind, target and title) are
    /// dropped so the first discovery wins, keeping true first-sight
    /// timestamps for reporting. Returns whether the finding was stored.
    pub fn ingest(&self, finding: Finding) -> bool {
        let mut inner = self.inner.write().expect("finding store poisoned");
        if !inner.seen.insert(finding.dedup_key()) {
            debug!(kind = %finding.kind, target = %finding.target, title = %finding.title,
                "dropping duplicate finding");
            return false;
        }
        inner.tallies[finding.severity.as_index()] += 1;
        inner.findings.push(finding);
        true
    }

    /// Number of stored findings with the given severity. O(1).
    pub fn count(&self, severity: Severity) -> usize {
        self.inner.read().expect("finding store poisoned").tallies[severity.as_index()]
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("finding store poisoned").findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All findings in insertion order.
    pub fn all(&self) -> Vec<Finding> {
        self.inner
            .read()
            .expect("finding store poisoned")
            .findings
            .clone()
    }

    /// Findings matching a predicate, in insertion order.
    pub fn filter<P>(&self, predicate: P) -> Vec<Finding>
    where
        P: Fn(&Finding) -> bool,
    {
        self.inner
            .read()
            .expect("finding store poisoned")
            .findings
            .iter()
            .filter(|f| predicate(f))
            .cloned()
            .collect()
    }

    pub fn by_kind(&self, kind: FindingKind) -> Vec<Finding> {
        self.filter(|f| f.kind == kind)
    }

    /// Records a failed module. Kept alongside findings so partial runs
    /// still produce a report that identifies what did not run to completion.
    pub fn record_module_error(&self, module: ModuleId, message: impl Into<String>) {
        let mut inner = self.inner.write().expect("finding store poisoned");
        inner.errors.push(ModuleFailure {
            module,
            message: message.into(),
        });
    }

    pub fn module_errors(&self) -> Vec<ModuleFailure> {
        self.inner
            .read()
            .expect("finding store poisoned")
            .errors
            .clone()
    }
}
