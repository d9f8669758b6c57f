// src/core/scanner/port_scanner.rs

use crate::core::error::ModuleError;
use crate::core::models::{Finding, FindingData, FindingKind, ModuleId, PortEntry, Severity};
use crate::core::scanner::{ScanContext, ScanModule};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

struct PortSpec {
    port: u16,
    service: &'static str,
    /// Exposure severity when the port answers. Remote-administration and
    /// database ports rank above plain web ports.
    severity: Severity,
}

const COMMON_PORTS: &[PortSpec] = &[
    PortSpec { port: 21, service: "FTP", severity: Severity::Medium },
    PortSpec { port: 22, service: "SSH", severity: Severity::Medium },
    PortSpec { port: 23, service: "Telnet", severity: Severity::High },
    PortSpec { port: 25, service: "SMTP", severity: Severity::Info },
    PortSpec { port: 53, service: "DNS", severity: Severity::Info },
    PortSpec { port: 80, service: "HTTP", severity: Severity::Info },
    PortSpec { port: 110, service: "POP3", severity: Severity::Low },
    PortSpec { port: 143, service: "IMAP", severity: Severity::Low },
    PortSpec { port: 443, service: "HTTPS", severity: Severity::Info },
    PortSpec { port: 445, service: "SMB", severity: Severity::High },
    PortSpec { port: 3306, service: "MySQL", severity: Severity::High },
    PortSpec { port: 3389, service: "RDP", severity: Severity::High },
    PortSpec { port: 5432, service: "PostgreSQL", severity: Severity::High },
    PortSpec { port: 6379, service: "Redis", severity: Severity::High },
    PortSpec { port: 8080, service: "HTTP-Alt", severity: Severity::Low },
    PortSpec { port: 8443, service: "HTTPS-Alt", severity: Severity::Low },
];

pub struct PortScanner;

#[async_trait]
impl ScanModule for PortScanner {
    fn id(&self) -> ModuleId {
        ModuleId::PortScan
    }

    fn phase_label(&self) -> &'static str {
        "Scanning ports..."
    }

    async fn run(&self, ctx: &ScanContext) -> Result<(), ModuleError> {
        let host = ctx.target().to_string();
        info!(target = %host, ports = COMMON_PORTS.len(), "Starting port scan.");

        let semaphore = Arc::new(Semaphore::new(ctx.config().concurrency));
        let probe_timeout = ctx.config().probe_timeout();

        let mut set: JoinSet<Option<&'static PortSpec>> = JoinSet::new();
        for spec in COMMON_PORTS {
            if ctx.is_cancelled() {
                debug!("cancellation observed while dispatching probes");
                break;
            }
            let addr = format!("{host}:{}", spec.port);
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                match tokio::time::timeout(probe_timeout, TcpStream::connect(&addr)).await {
                    Ok(Ok(_stream)) => Some(spec),
                    Ok(Err(e)) => {
                        debug!(addr = %addr, error = %e, "port closed");
                        None
                    }
                    Err(_) => {
                        debug!(addr = %addr, "port filtered (connect timeout)");
                        None
                    }
                }
            });
        }

        let mut open = 0usize;
        while let Some(result) = set.join_next().await {
            if ctx.is_cancelled() {
                set.abort_all();
                break;
            }
            let Ok(Some(spec)) = result else {
                continue;
            };
            open += 1;
            let finding = Finding::new(
                FindingKind::Port,
                spec.severity,
                "Open port detected",
                format!(
                    "Port {} ({}) is open and accessible",
                    spec.port, spec.service
                ),
                format!("{host}:{}", spec.port),
            )
            .with_data(FindingData::Port(PortEntry {
                host: host.clone(),
                port: spec.port,
                service: spec.service.to_string(),
                state: "open".to_string(),
            }));
            ctx.emit(finding).await;
        }

        info!(open, "Port scan finished.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_admin_ports_rank_above_web_ports() {
        let ssh = COMMON_PORTS.iter().find(|p| p.port == 22).unwrap();
        let https = COMMON_PORTS.iter().find(|p| p.port == 443).unwrap();
        let telnet = COMMON_PORTS.iter().find(|p| p.port == 23).unwrap();
        assert_eq!(ssh.severity, Severity::Medium);
        assert_eq!(https.severity, Severity::Info);
        assert!(telnet.severity > ssh.severity);
    }
}
