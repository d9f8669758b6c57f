// src/core/scanner/subdomain_scanner.rs

use crate::core::error::ModuleError;
use crate::core::models::{Finding, FindingData, FindingKind, ModuleId, Severity, SubdomainEntry};
use crate::core::scanner::{ScanContext, ScanModule};
use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Candidate names probed in front of the root domain.
const CANDIDATES: &[&str] = &[
    "www", "mail", "api", "admin", "dev", "stage", "staging", "test", "portal", "vpn", "blog",
    "shop", "cdn", "ns1", "ns2", "ftp", "webmail", "remote", "m", "app", "docs", "status",
];

/// Names that indicate a non-production or administrative surface; their
/// exposure is worth a slightly higher tier than a plain public host.
const SENSITIVE: &[&str] = &["admin", "dev", "stage", "staging", "test", "vpn", "remote"];

pub struct SubdomainScanner;

#[async_trait]
impl ScanModule for SubdomainScanner {
    fn id(&self) -> ModuleId {
        ModuleId::Subdomain
    }

    fn phase_label(&self) -> &'static str {
        "Discovering subdomains..."
    }

    async fn run(&self, ctx: &ScanContext) -> Result<(), ModuleError> {
        // Probe against the root domain; "www.example.com" candidates would
        // otherwise become "www.www.example.com".
        let root = ctx
            .target()
            .strip_prefix("www.")
            .unwrap_or(ctx.target())
            .to_string();
        info!(target = %root, "Starting subdomain discovery.");

        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        let semaphore = Arc::new(Semaphore::new(ctx.config().concurrency));
        let probe_timeout = ctx.config().probe_timeout();

        let mut set: JoinSet<Option<(String, String)>> = JoinSet::new();
        for candidate in CANDIDATES {
            if ctx.is_cancelled() {
                debug!("cancellation observed while dispatching probes");
                break;
            }
            let host = format!("{candidate}.{root}");
            let resolver = resolver.clone();
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                match tokio::time::timeout(probe_timeout, resolver.lookup_ip(host.clone())).await {
                    Ok(Ok(lookup)) => {
                        let ip = lookup.iter().next()?;
                        Some((host, ip.to_string()))
                    }
                    Ok(Err(e)) => {
                        // NXDOMAIN for most candidates is the normal case.
                        debug!(host = %host, error = %e, "candidate did not resolve");
                        None
                    }
                    Err(_) => {
                        warn!(host = %host, "subdomain probe timed out");
                        None
                    }
                }
            });
        }

        let mut discovered = 0usize;
        while let Some(result) = set.join_next().await {
            if ctx.is_cancelled() {
                set.abort_all();
                break;
            }
            let Ok(Some((host, ip))) = result else {
                continue;
            };
            discovered += 1;
            let severity = if is_sensitive(&host, &root) {
                Severity::Low
            } else {
                Severity::Info
            };
            let finding = Finding::new(
                FindingKind::Subdomain,
                severity,
                "Subdomain discovered",
                format!("Found subdomain: {host} ({ip})"),
                host.clone(),
            )
            .with_data(FindingData::Subdomain(SubdomainEntry {
                name: host,
                ip: Some(ip),
                status: "active".to_string(),
            }));
            ctx.emit(finding).await;
        }

        info!(discovered, "Subdomain discovery finished.");
        Ok(())
    }
}

fn is_sensitive(host: &str, root: &str) -> bool {
    host.strip_suffix(root)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .map(|label| SENSITIVE.contains(&label))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_labels_are_flagged() {
        assert!(is_sensitive("admin.example.com", "example.com"));
        assert!(is_sensitive("staging.example.com", "example.com"));
        assert!(!is_sensitive("www.example.com", "example.com"));
        assert!(!is_sensitive("example.com", "example.com"));
    }
}
