// src/core/scanner/ssl_scanner.rs

use crate::core::error::ModuleError;
use crate::core::knowledge_base::get_finding_detail;
use crate::core::models::{Finding, FindingKind, ModuleId, Severity};
use crate::core::scanner::{ScanContext, ScanModule};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info};
use x509_parser::prelude::*;

/// Certificate facts extracted during the handshake.
#[derive(Debug)]
struct CertificateInfo {
    subject_name: String,
    issuer_name: String,
    not_after: DateTime<Utc>,
    days_until_expiry: i64,
    is_valid: bool,
}

pub struct SslScanner;

#[async_trait]
impl ScanModule for SslScanner {
    fn id(&self) -> ModuleId {
        ModuleId::Ssl
    }

    fn phase_label(&self) -> &'static str {
        "Analyzing SSL/TLS..."
    }

    async fn run(&self, ctx: &ScanContext) -> Result<(), ModuleError> {
        info!(target = %ctx.target(), "Starting SSL/TLS scan.");
        let host = ctx.target().to_string();
        let endpoint = format!("{host}:443");

        if ctx.is_cancelled() {
            return Ok(());
        }

        // native-tls is blocking; the handshake runs off the async runtime.
        // The probe timeout bounds each blocking step so an unresponsive
        // host cannot pin the thread past the module timeout.
        let probe_timeout = ctx.config().probe_timeout();
        debug!("Spawning blocking task for TLS connection.");
        let scan_result = spawn_blocking(move || perform_tls_scan(&host, probe_timeout))
            .await
            .unwrap_or_else(|e| {
                error!(panic = %e, "blocking SSL scan task panicked");
                Err(ModuleError::Tls(format!("task panicked: {e}")))
            });

        match scan_result {
            Err(e) => {
                // A failed handshake is itself a reportable security fact,
                // not an engine fault.
                debug!(error = %e, "TLS handshake failed, reporting finding");
                if let Some(detail) = get_finding_detail("SSL_HANDSHAKE_FAILED") {
                    ctx.emit(detail.to_finding(&endpoint)).await;
                }
            }
            Ok(None) => {
                if let Some(detail) = get_finding_detail("SSL_NO_CERTIFICATE") {
                    ctx.emit(detail.to_finding(&endpoint)).await;
                }
            }
            Ok(Some(cert)) => {
                info!(subject = %cert.subject_name, issuer = %cert.issuer_name,
                    "Certificate parsed.");
                if !cert.is_valid {
                    debug!(expiry = %cert.not_after, "certificate outside validity window");
                    if let Some(detail) = get_finding_detail("SSL_EXPIRED") {
                        ctx.emit(detail.to_finding(&endpoint)).await;
                    }
                } else if (0..=30).contains(&cert.days_until_expiry) {
                    debug!(days_left = cert.days_until_expiry, "certificate expiring soon");
                    if let Some(detail) = get_finding_detail("SSL_EXPIRING_SOON") {
                        ctx.emit(detail.to_finding(&endpoint)).await;
                    }
                }

                // Always record the certificate facts themselves.
                let summary = Finding::new(
                    FindingKind::Ssl,
                    Severity::Info,
                    "SSL certificate details",
                    format!(
                        "Subject: {}; Issuer: {}; expires {} ({} days)",
                        cert.subject_name,
                        cert.issuer_name,
                        cert.not_after.format("%Y-%m-%d"),
                        cert.days_until_expiry
                    ),
                    &endpoint,
                );
                ctx.emit(summary).await;
            }
        }

        info!("SSL/TLS scan finished.");
        Ok(())
    }
}

/// Connects to port 443, performs the TLS handshake and parses the peer
/// certificate. Returns `Ok(None)` when the server presents no certificate.
/// Every blocking step (connect, handshake reads/writes) is bounded by
/// `timeout`.
fn perform_tls_scan(target: &str, timeout: Duration) -> Result<Option<CertificateInfo>, ModuleError> {
    debug!(target, "Performing TLS connection and handshake.");

    let connector =
        TlsConnector::new().map_err(|e| ModuleError::Tls(format!("connector: {e}")))?;

    debug!(target, "Connecting TCP stream to port 443.");
    let addr = (target, 443)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ModuleError::Dns(format!("no address for {target}")))?;
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    debug!(target, "Performing TLS handshake.");
    let stream = connector
        .connect(target, stream)
        .map_err(|e| ModuleError::Tls(format!("handshake: {e}")))?;

    let cert = match stream.peer_certificate() {
        Ok(Some(c)) => c,
        Ok(None) => {
            debug!("TLS connection successful, but no peer certificate provided.");
            return Ok(None);
        }
        Err(e) => return Err(ModuleError::Tls(format!("peer certificate: {e}"))),
    };

    let cert_der = cert
        .to_der()
        .map_err(|e| ModuleError::Tls(format!("DER conversion: {e}")))?;
    let (_, x509) = parse_x509_certificate(&cert_der)
        .map_err(|e| ModuleError::Tls(format!("X.509 parse: {e}")))?;

    let validity = x509.validity();
    let not_after = asn1_time_to_chrono_utc(&validity.not_after);
    let not_before = asn1_time_to_chrono_utc(&validity.not_before);
    let now = Utc::now();

    Ok(Some(CertificateInfo {
        subject_name: x509.subject().to_string(),
        issuer_name: x509.issuer().to_string(),
        not_after,
        days_until_expiry: not_after.signed_duration_since(now).num_days(),
        is_valid: now > not_before && now < not_after,
    }))
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}
