// src/core/config.rs

use crate::core::error::ModuleError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one scan run. All fields have sensible defaults, so a config
/// file only needs to override what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on concurrent probes within a single module.
    pub concurrency: usize,
    /// Hard ceiling on one module's total run time. A module exceeding it is
    /// treated as a failed module, not a fatal run failure.
    pub module_timeout_secs: u64,
    /// Timeout for one discrete probe (TCP connect, DNS lookup).
    pub probe_timeout_ms: u64,
    /// Timeout applied to HTTP requests issued by modules.
    pub http_timeout_secs: u64,
    /// Bound on the summary-generation collaborator.
    pub summary_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            module_timeout_secs: 120,
            probe_timeout_ms: 3_000,
            http_timeout_secs: 10,
            summary_timeout_secs: 30,
            user_agent: format!("WebRaptor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ScanConfig {
    pub fn module_timeout(&self) -> Duration {
        Duration::from_secs(self.module_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn summary_timeout(&self) -> Duration {
        Duration::from_secs(self.summary_timeout_secs)
    }

    /// Builds the HTTP client shared by a module's requests.
    pub fn http_client(&self) -> Result<reqwest::Client, ModuleError> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .build()
            .map_err(ModuleError::from)
    }
}
