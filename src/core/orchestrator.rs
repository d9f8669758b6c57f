// src/core/orchestrator.rs

use crate::core::aggregator::FindingStore;
use crate::core::cancel::CancelToken;
use crate::core::config::ScanConfig;
use crate::core::error::ScanError;
use crate::core::models::{ModuleId, Progress, ScanSnapshot, ScanStatus};
use crate::core::progress::ProgressTracker;
use crate::core::scanner::{ScanContext, ScanModule, builtin_modules};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

#[derive(Default)]
struct RunMeta {
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

struct RunShared {
    target: String,
    store: Arc<FindingStore>,
    tracker: ProgressTracker,
    cancel: CancelToken,
    meta: RwLock<RunMeta>,
}

/// Handle to one scan run: exposes progress observation, the finding store,
/// cooperative stop, and a snapshot for report compilation.
pub struct ScanHandle {
    shared: Arc<RunShared>,
    task: Option<JoinHandle<()>>,
}

impl ScanHandle {
    pub fn target(&self) -> &str {
        &self.shared.target
    }

    /// Subscribes to progress updates. The receiver's initial value is the
    /// current state, so late subscribers do not miss it.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.shared.tracker.subscribe()
    }

    pub fn status(&self) -> ScanStatus {
        self.shared.tracker.current().status
    }

    pub fn store(&self) -> Arc<FindingStore> {
        Arc::clone(&self.shared.store)
    }

    /// A detached cancellation trigger for this run, usable from signal
    /// handlers or other tasks that cannot hold the handle itself.
    pub fn canceller(&self) -> CancelToken {
        self.shared.cancel.clone()
    }

    /// Requests cancellation. Dispatch of subsequent phases halts; a module
    /// already in flight gets a best-effort cancellation signal. Findings
    /// already ingested are preserved.
    pub fn stop(&self) {
        info!(target = %self.shared.target, "stop requested");
        self.shared.cancel.cancel();
    }

    /// Waits for the run to reach a terminal state.
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "scan task join failed");
            }
        }
    }

    /// Immutable copy of the run's current state.
    pub fn snapshot(&self) -> ScanSnapshot {
        let progress = self.shared.tracker.current();
        let meta = self.shared.meta.read().expect("run meta poisoned");
        ScanSnapshot {
            target: self.shared.target.clone(),
            status: progress.status,
            started_at: meta.started_at,
            ended_at: meta.ended_at,
            findings: self.shared.store.all(),
            module_errors: self.shared.store.module_errors(),
        }
    }
}

/// Drives the ordered execution of selected scan modules against one target.
///
/// Modules run sequentially in fixed phase order; each module may fan out
/// internally up to the configured concurrency. A module failure is recorded
/// and the run continues; only invalid input is fatal to the start call.
pub struct Orchestrator {
    config: ScanConfig,
    modules: Vec<Arc<dyn ScanModule>>,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Orchestrator {
    pub fn new(config: ScanConfig) -> Self {
        Self::with_modules(config, builtin_modules())
    }

    /// Builds an orchestrator over an explicit module set. The uniform
    /// module interface means deterministic test doubles slot in here
    /// without changing any orchestration code.
    pub fn with_modules(config: ScanConfig, modules: Vec<Arc<dyn ScanModule>>) -> Self {
        Self {
            config,
            modules,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Reduces raw user input to a bare host: scheme and path are stripped,
    /// "example.com/x" and "https://example.com/x" both normalize to
    /// "example.com".
    pub fn normalize_target(raw: &str) -> Result<String, ScanError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScanError::InvalidTarget(raw.to_string()));
        }
        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };
        Url::parse(&with_scheme)
            .ok()
            .and_then(|url| url.host_str().map(String::from))
            .ok_or_else(|| ScanError::InvalidTarget(raw.to_string()))
    }

    /// Starts a scan against `target` running the selected modules.
    ///
    /// Fails synchronously on malformed targets, empty selections, and when
    /// a run for the same target is still active. The returned handle is the
    /// only way to observe and stop the run; no global state is involved, so
    /// concurrent runs against different targets are independent.
    pub fn start_scan(
        &self,
        target: &str,
        selection: &BTreeSet<ModuleId>,
    ) -> Result<ScanHandle, ScanError> {
        let host = Self::normalize_target(target)?;

        let selected: Vec<Arc<dyn ScanModule>> = self
            .modules
            .iter()
            .filter(|m| selection.contains(&m.id()))
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(ScanError::NoModulesSelected);
        }

        {
            let mut active = self.active.lock().expect("active registry poisoned");
            if !active.insert(host.clone()) {
                return Err(ScanError::AlreadyRunning(host));
            }
        }

        let shared = Arc::new(RunShared {
            target: host.clone(),
            store: Arc::new(FindingStore::new()),
            tracker: ProgressTracker::new(),
            cancel: CancelToken::new(),
            meta: RwLock::new(RunMeta::default()),
        });

        info!(target = %host, modules = selected.len(), "starting scan");
        let task = tokio::spawn(run_scan(
            Arc::clone(&shared),
            selected,
            self.config.clone(),
            Arc::clone(&self.active),
        ));

        Ok(ScanHandle {
            shared,
            task: Some(task),
        })
    }
}

/// The run loop: Initialize, then each selected module in phase order, then
/// the report phase. Progress fraction counts only selected phases.
async fn run_scan(
    shared: Arc<RunShared>,
    selected: Vec<Arc<dyn ScanModule>>,
    config: ScanConfig,
    active: Arc<Mutex<HashSet<String>>>,
) {
    // Initialize and Report bracket the module phases in the denominator.
    let total_phases = selected.len() + 2;
    let fraction = |completed: usize| completed as f64 / total_phases as f64;

    shared.tracker.start("Initializing scan...");
    shared.meta.write().expect("run meta poisoned").started_at = Some(Utc::now());

    let ctx = ScanContext::new(
        shared.target.clone(),
        config.clone(),
        Arc::clone(&shared.store),
        shared.cancel.clone(),
    );

    let mut completed = 1usize; // Initialize phase has no work of its own.
    let mut stopped = false;

    for module in &selected {
        if shared.cancel.is_cancelled() {
            stopped = true;
            break;
        }

        // Publish the phase transition before any finding from this phase
        // can reach the store.
        shared
            .tracker
            .advance(module.phase_label(), fraction(completed));

        let module_run = tokio::time::timeout(config.module_timeout(), module.run(&ctx));
        tokio::select! {
            // Best-effort abort of an in-flight module on stop; modules also
            // check the token themselves between units of work.
            _ = shared.cancel.cancelled() => {
                stopped = true;
            }
            result = module_run => match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(module = %module.id(), error = %e, "module failed, continuing");
                    shared.store.record_module_error(module.id(), e.to_string());
                }
                Err(_) => {
                    warn!(module = %module.id(), timeout = ?config.module_timeout(),
                        "module timed out, continuing");
                    shared.store.record_module_error(
                        module.id(),
                        format!("timed out after {:?}", config.module_timeout()),
                    );
                }
            },
        }

        if stopped || shared.cancel.is_cancelled() {
            stopped = true;
            break;
        }
        completed += 1;
    }

    if stopped {
        shared.tracker.stop();
    } else {
        shared.tracker.advance("Generating report...", fraction(completed));
        shared.tracker.complete();
    }
    shared.meta.write().expect("run meta poisoned").ended_at = Some(Utc::now());

    active
        .lock()
        .expect("active registry poisoned")
        .remove(&shared.target);
    info!(target = %shared.target, status = %shared.tracker.current().status,
        findings = shared.store.len(), "scan finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ModuleError;
    use crate::core::models::{Finding, FindingKind, Severity};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Deterministic module emitting a fixed finding list.
    struct EmitModule {
        id: ModuleId,
        findings: Vec<(FindingKind, Severity, &'static str, &'static str)>,
    }

    #[async_trait]
    impl ScanModule for EmitModule {
        fn id(&self) -> ModuleId {
            self.id
        }
        fn phase_label(&self) -> &'static str {
            "Running test module..."
        }
        async fn run(&self, ctx: &ScanContext) -> Result<(), ModuleError> {
            for (kind, severity, title, target) in &self.findings {
                ctx.emit(Finding::new(*kind, *severity, *title, "test finding", *target))
                    .await;
            }
            Ok(())
        }
    }

    /// Fails immediately.
    struct FailingModule {
        id: ModuleId,
    }

    #[async_trait]
    impl ScanModule for FailingModule {
        fn id(&self) -> ModuleId {
            self.id
        }
        fn phase_label(&self) -> &'static str {
            "Failing test module..."
        }
        async fn run(&self, _ctx: &ScanContext) -> Result<(), ModuleError> {
            Err(ModuleError::Dns("resolver unreachable".to_string()))
        }
    }

    /// Blocks until cancelled.
    struct HangingModule {
        id: ModuleId,
    }

    #[async_trait]
    impl ScanModule for HangingModule {
        fn id(&self) -> ModuleId {
            self.id
        }
        fn phase_label(&self) -> &'static str {
            "Hanging test module..."
        }
        async fn run(&self, ctx: &ScanContext) -> Result<(), ModuleError> {
            ctx.cancelled().await;
            Ok(())
        }
    }

    fn scenario_modules() -> Vec<Arc<dyn ScanModule>> {
        vec![
            Arc::new(EmitModule {
                id: ModuleId::Subdomain,
                findings: vec![(
                    FindingKind::Subdomain,
                    Severity::Info,
                    "Subdomain discovered",
                    "www.example.com",
                )],
            }),
            Arc::new(EmitModule {
                id: ModuleId::PortScan,
                findings: vec![(
                    FindingKind::Port,
                    Severity::Medium,
                    "Open port detected",
                    "example.com:22",
                )],
            }),
        ]
    }

    fn selection(ids: &[ModuleId]) -> BTreeSet<ModuleId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn target_normalization() {
        assert_eq!(
            Orchestrator::normalize_target("https://example.com/login").unwrap(),
            "example.com"
        );
        assert_eq!(
            Orchestrator::normalize_target("example.com").unwrap(),
            "example.com"
        );
        assert_eq!(
            Orchestrator::normalize_target("EXAMPLE.com").unwrap(),
            "example.com"
        );
        assert!(matches!(
            Orchestrator::normalize_target(""),
            Err(ScanError::InvalidTarget(_))
        ));
        assert!(matches!(
            Orchestrator::normalize_target("   "),
            Err(ScanError::InvalidTarget(_))
        ));
    }

    #[tokio::test]
    async fn two_module_scenario_completes_with_expected_tallies() {
        let orchestrator = Orchestrator::with_modules(ScanConfig::default(), scenario_modules());
        let mut handle = orchestrator
            .start_scan(
                "example.com",
                &selection(&[ModuleId::Subdomain, ModuleId::PortScan]),
            )
            .unwrap();
        handle.wait().await;

        assert_eq!(handle.status(), ScanStatus::Completed);
        let store = handle.store();
        assert_eq!(store.len(), 2);
        assert_eq!(store.count(Severity::Medium), 1);
        assert_eq!(store.count(Severity::Info), 1);

        let progress = handle.progress().borrow().clone();
        assert_eq!(progress.fraction, 1.0);

        let snapshot = handle.snapshot();
        assert!(snapshot.started_at.is_some());
        assert!(snapshot.ended_at.is_some());
        assert!(snapshot.module_errors.is_empty());
    }

    #[tokio::test]
    async fn empty_selection_is_rejected() {
        let orchestrator = Orchestrator::with_modules(ScanConfig::default(), scenario_modules());
        let result = orchestrator.start_scan("example.com", &BTreeSet::new());
        assert!(matches!(result, Err(ScanError::NoModulesSelected)));
    }

    #[tokio::test]
    async fn second_scan_for_same_target_is_rejected_while_running() {
        let orchestrator = Orchestrator::with_modules(
            ScanConfig::default(),
            vec![Arc::new(HangingModule {
                id: ModuleId::Subdomain,
            })],
        );
        let sel = selection(&[ModuleId::Subdomain]);
        let mut first = orchestrator.start_scan("example.com", &sel).unwrap();

        let second = orchestrator.start_scan("https://example.com/path", &sel);
        assert!(matches!(second, Err(ScanError::AlreadyRunning(_))));
        // A different target is unaffected by the active run.
        let mut other = orchestrator.start_scan("other.example.org", &sel).unwrap();

        first.stop();
        other.stop();
        first.wait().await;
        other.wait().await;

        // After the first run reached a terminal state the target is free.
        let mut again = orchestrator.start_scan("example.com", &sel).unwrap();
        again.stop();
        again.wait().await;
    }

    #[tokio::test]
    async fn module_failure_is_recorded_and_run_continues() {
        let modules: Vec<Arc<dyn ScanModule>> = vec![
            Arc::new(FailingModule {
                id: ModuleId::Subdomain,
            }),
            Arc::new(EmitModule {
                id: ModuleId::PortScan,
                findings: vec![(
                    FindingKind::Port,
                    Severity::Medium,
                    "Open port detected",
                    "example.com:22",
                )],
            }),
        ];
        let orchestrator = Orchestrator::with_modules(ScanConfig::default(), modules);
        let mut handle = orchestrator
            .start_scan(
                "example.com",
                &selection(&[ModuleId::Subdomain, ModuleId::PortScan]),
            )
            .unwrap();
        handle.wait().await;

        assert_eq!(handle.status(), ScanStatus::Completed);
        assert_eq!(handle.store().len(), 1);
        let errors = handle.store().module_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].module, ModuleId::Subdomain);
    }

    #[tokio::test]
    async fn module_timeout_is_treated_as_module_failure() {
        let config = ScanConfig {
            module_timeout_secs: 0,
            ..ScanConfig::default()
        };
        let orchestrator = Orchestrator::with_modules(
            config,
            vec![Arc::new(HangingModule {
                id: ModuleId::Subdomain,
            })],
        );
        let mut handle = orchestrator
            .start_scan("example.com", &selection(&[ModuleId::Subdomain]))
            .unwrap();
        handle.wait().await;

        assert_eq!(handle.status(), ScanStatus::Completed);
        let errors = handle.store().module_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("timed out"));
    }

    #[tokio::test]
    async fn stop_freezes_progress_and_preserves_findings() {
        let modules: Vec<Arc<dyn ScanModule>> = vec![
            Arc::new(EmitModule {
                id: ModuleId::Subdomain,
                findings: vec![(
                    FindingKind::Subdomain,
                    Severity::Info,
                    "Subdomain discovered",
                    "www.example.com",
                )],
            }),
            Arc::new(HangingModule {
                id: ModuleId::PortScan,
            }),
        ];
        let orchestrator = Orchestrator::with_modules(ScanConfig::default(), modules);
        let mut handle = orchestrator
            .start_scan(
                "example.com",
                &selection(&[ModuleId::Subdomain, ModuleId::PortScan]),
            )
            .unwrap();

        // Wait for the first module's finding to land, then stop mid-run.
        let store = handle.store();
        for _ in 0..200 {
            if store.len() >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.len(), 1);

        let fraction_before = handle.progress().borrow().fraction;
        handle.stop();
        handle.wait().await;

        assert_eq!(handle.status(), ScanStatus::Stopped);
        let progress = handle.progress().borrow().clone();
        assert_eq!(progress.fraction, fraction_before);
        assert!(progress.fraction < 1.0);
        // No rollback of partial results.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn fraction_reflects_only_selected_phases() {
        // One selected module out of two registered: Initialize + module +
        // Report = 3 phases in the denominator.
        let orchestrator = Orchestrator::with_modules(ScanConfig::default(), scenario_modules());
        let handle = orchestrator
            .start_scan("example.com", &selection(&[ModuleId::PortScan]))
            .unwrap();

        let mut rx = handle.progress();
        let mut fractions = vec![rx.borrow().fraction];
        while rx.changed().await.is_ok() {
            let p = rx.borrow().clone();
            fractions.push(p.fraction);
            if p.status.is_terminal() {
                break;
            }
        }

        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(fractions.last(), Some(&1.0));
        let expected = 1.0 / 3.0;
        assert!(
            fractions.iter().any(|f| (f - expected).abs() < 1e-9),
            "expected a 1/3 phase step in {fractions:?}"
        );
    }
}
