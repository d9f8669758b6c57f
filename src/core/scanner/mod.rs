// src/core/scanner/mod.rs

// Public interface of the `scanner` module: the capability trait every scan
// module implements, the context handed to a running module, and the
// registry of built-in modules.

pub mod dir_scanner;
pub mod fingerprint_scanner;
pub mod osint_scanner;
pub mod port_scanner;
pub mod ssl_scanner;
pub mod subdomain_scanner;
pub mod vuln_scanner;

use crate::core::aggregator::FindingStore;
use crate::core::cancel::CancelToken;
use crate::core::config::ScanConfig;
use crate::core::error::ModuleError;
use crate::core::models::{Finding, ModuleId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Everything a module needs while it runs: the normalized target, the run
/// configuration, the finding sink and the run-scoped cancellation token.
pub struct ScanContext {
    target: String,
    config: ScanConfig,
    store: Arc<FindingStore>,
    cancel: CancelToken,
}

impl ScanContext {
    pub fn new(
        target: impl Into<String>,
        config: ScanConfig,
        store: Arc<FindingStore>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            target: target.into(),
            config,
            store,
            cancel,
        }
    }

    /// The normalized host the scan runs against.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Forwards a finding to the aggregator, then yields so progress
    /// observers get scheduled between findings.
    pub async fn emit(&self, finding: Finding) {
        if self.store.ingest(finding) {
            tokio::task::yield_now().await;
        }
    }

    /// Checked by modules between discrete units of work.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// Uniform capability interface over all scan module variants.
///
/// The orchestrator treats every module identically for sequencing,
/// cancellation and error handling; the module owns its own algorithm and
/// external I/O. Implementations must be stateless across calls (a fresh
/// `run` is a new independent execution) and must observe the context's
/// cancellation signal between units of work.
#[async_trait]
pub trait ScanModule: Send + Sync {
    fn id(&self) -> ModuleId;

    /// Human-readable phase label published while the module runs.
    fn phase_label(&self) -> &'static str;

    /// Executes the module against the context's target, emitting findings
    /// through the context as they are produced.
    async fn run(&self, ctx: &ScanContext) -> Result<(), ModuleError>;
}

/// All built-in modules in fixed phase order.
pub fn builtin_modules() -> Vec<Arc<dyn ScanModule>> {
    let modules: Vec<Arc<dyn ScanModule>> = vec![
        Arc::new(subdomain_scanner::SubdomainScanner),
        Arc::new(port_scanner::PortScanner),
        Arc::new(fingerprint_scanner::FingerprintScanner),
        Arc::new(vuln_scanner::VulnScanner),
        Arc::new(dir_scanner::DirScanner),
        Arc::new(ssl_scanner::SslScanner),
        Arc::new(osint_scanner::OsintScanner),
    ];
    debug!(count = modules.len(), "built-in module registry assembled");
    modules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{FindingKind, Severity};
    use strum::IntoEnumIterator;

    #[test]
    fn registry_covers_every_module_id_in_phase_order() {
        let ids: Vec<ModuleId> = builtin_modules().iter().map(|m| m.id()).collect();
        let expected: Vec<ModuleId> = ModuleId::iter().collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn emit_deduplicates_through_the_store() {
        let store = Arc::new(FindingStore::new());
        let ctx = ScanContext::new(
            "example.com",
            ScanConfig::default(),
            Arc::clone(&store),
            CancelToken::new(),
        );
        let make = || {
            Finding::new(
                FindingKind::Port,
                Severity::Info,
                "Open port detected",
                "d",
                "example.com:80",
            )
        };
        ctx.emit(make()).await;
        ctx.emit(make()).await;
        assert_eq!(store.len(), 1);
    }
}
