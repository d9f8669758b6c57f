// src/core/scanner/dir_scanner.rs

use crate::core::error::ModuleError;
use crate::core::knowledge_base::get_finding_detail;
use crate::core::models::ModuleId;
use crate::core::scanner::{ScanContext, ScanModule};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Paths probed against the target, each classified by a knowledge-base code
/// when it answers.
const PROBES: &[(&str, &str)] = &[
    ("/.env", "DIR_ENV_FILE_EXPOSED"),
    ("/.git/HEAD", "DIR_GIT_EXPOSED"),
    ("/phpinfo.php", "DIR_PHPINFO_EXPOSED"),
    ("/admin", "DIR_ADMIN_EXPOSED"),
    ("/administrator", "DIR_ADMIN_EXPOSED"),
    ("/wp-admin", "DIR_ADMIN_EXPOSED"),
    ("/server-status", "DIR_SERVER_STATUS_EXPOSED"),
    ("/backup.zip", "DIR_BACKUP_EXPOSED"),
    ("/backup.sql", "DIR_BACKUP_EXPOSED"),
    ("/db.sql", "DIR_BACKUP_EXPOSED"),
];

pub struct DirScanner;

#[async_trait]
impl ScanModule for DirScanner {
    fn id(&self) -> ModuleId {
        ModuleId::DirBruteforce
    }

    fn phase_label(&self) -> &'static str {
        "Bruteforcing directories..."
    }

    async fn run(&self, ctx: &ScanContext) -> Result<(), ModuleError> {
        info!(target = %ctx.target(), paths = PROBES.len(), "Starting directory bruteforce.");
        let client = ctx.config().http_client()?;
        let base = format!("https://{}", ctx.target());

        let mut exposed = 0usize;
        // Sequential on purpose: a handful of probes, and the per-path
        // cancellation check keeps stop latency at one request.
        for (path, code) in PROBES {
            if ctx.is_cancelled() {
                debug!("cancellation observed between path probes");
                break;
            }
            let url = format!("{base}{path}");
            let response = match client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    // One unreachable path does not fail the module; the
                    // target may drop probes selectively.
                    warn!(url = %url, error = %e, "path probe failed");
                    continue;
                }
            };
            if !response.status().is_success() {
                debug!(url = %url, status = %response.status(), "path not exposed");
                continue;
            }
            let Some(detail) = get_finding_detail(code) else {
                continue;
            };
            exposed += 1;
            ctx.emit(detail.to_finding(&url)).await;
        }

        info!(exposed, "Directory bruteforce finished.");
        Ok(())
    }
}
