// src/core/report.rs

use crate::core::error::{ScanError, SummaryError};
use crate::core::models::{
    FindingData, FindingKind, OsintData, Report, ScanSnapshot, Severity,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Used whenever the summary collaborator fails or exceeds its deadline. The
/// report itself is never blocked on the narrative.
pub const FALLBACK_SUMMARY: &str =
    "Unable to generate summary. Please review the detailed findings below.";

/// Produces the narrative summary for a compiled report. The default
/// implementation below is a deterministic template; richer collaborators
/// (e.g. an LLM-backed one) plug in behind the same trait.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn generate(&self, report: &Report) -> Result<String, SummaryError>;
}

/// Deterministic summary built from severity tallies. No I/O, never fails.
pub struct TemplateSummaryGenerator;

#[async_trait]
impl SummaryGenerator for TemplateSummaryGenerator {
    async fn generate(&self, report: &Report) -> Result<String, SummaryError> {
        let mut tallies = [0usize; 5];
        for finding in &report.vulnerabilities {
            tallies[finding.severity.as_index()] += 1;
        }
        let total = report.vulnerabilities.len();

        let mut summary = format!(
            "Security scan of {} completed in {}. ",
            report.target, report.scan_duration
        );
        if total == 0 {
            summary.push_str("No security issues were identified. ");
        } else {
            let breakdown: Vec<String> = Severity::ALL
                .iter()
                .rev()
                .filter(|s| tallies[s.as_index()] > 0)
                .map(|s| format!("{} {}", tallies[s.as_index()], s))
                .collect();
            summary.push_str(&format!(
                "{total} issue(s) were identified ({}). ",
                breakdown.join(", ")
            ));
            if tallies[Severity::Critical.as_index()] > 0 {
                summary.push_str("Critical issues require immediate remediation. ");
            } else if tallies[Severity::High.as_index()] > 0 {
                summary.push_str("High-severity issues should be addressed promptly. ");
            }
        }

        summary.push_str(&format!(
            "Reconnaissance surfaced {} subdomain(s), {} open port(s) and {} technology(ies).",
            report.osint_data.subdomains.len(),
            report.osint_data.open_ports.len(),
            report.osint_data.technologies.len()
        ));
        if !report.module_errors.is_empty() {
            summary.push_str(&format!(
                " Note: {} module(s) did not run to completion; coverage is partial.",
                report.module_errors.len()
            ));
        }
        Ok(summary)
    }
}

/// Turns a terminal scan snapshot into the final report artifact.
pub struct ReportCompiler;

impl ReportCompiler {
    /// Compiles the report and asks `generator` for the narrative summary,
    /// bounded by `summary_timeout`. A generator failure or timeout degrades
    /// to [`FALLBACK_SUMMARY`]; it never fails the compilation.
    pub async fn compile(
        snapshot: &ScanSnapshot,
        generator: &dyn SummaryGenerator,
        summary_timeout: Duration,
    ) -> Result<Report, ScanError> {
        if !snapshot.status.is_terminal() {
            return Err(ScanError::IncompleteRun(snapshot.status));
        }
        info!(target = %snapshot.target, findings = snapshot.findings.len(),
            "Compiling report.");

        // Only classified vulnerability findings belong here; elevated
        // reconnaissance facts (risky open ports, sensitive subdomains) stay
        // in their OSINT groups with their severity intact.
        let mut vulnerabilities: Vec<_> = snapshot
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::Vulnerability)
            .cloned()
            .collect();
        // Stable: equal severities keep discovery order.
        vulnerabilities.sort_by(|a, b| b.severity.cmp(&a.severity));

        let osint_data = group_osint(snapshot);

        let scan_date = snapshot.started_at.unwrap_or_else(chrono::Utc::now);
        let scan_duration = match (snapshot.started_at, snapshot.ended_at) {
            (Some(start), Some(end)) => {
                format_duration(end.signed_duration_since(start).num_seconds().max(0) as u64)
            }
            _ => "unknown".to_string(),
        };

        let mut report = Report {
            target: snapshot.target.clone(),
            scan_date,
            scan_duration,
            vulnerabilities,
            osint_data,
            summary: None,
            module_errors: snapshot.module_errors.clone(),
        };

        let summary = match tokio::time::timeout(summary_timeout, generator.generate(&report))
            .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = %e, "summary generation failed, using fallback");
                FALLBACK_SUMMARY.to_string()
            }
            Err(_) => {
                warn!(timeout = ?summary_timeout, "summary generation timed out, using fallback");
                FALLBACK_SUMMARY.to_string()
            }
        };
        report.summary = Some(summary);

        debug!(vulnerabilities = report.vulnerabilities.len(), "Report compiled.");
        Ok(report)
    }
}

/// Groups reconnaissance findings by category from their typed payloads.
/// Findings without a payload contribute nothing here; they remain visible
/// in the vulnerability section or the raw snapshot.
fn group_osint(snapshot: &ScanSnapshot) -> OsintData {
    let mut osint = OsintData::default();
    for finding in &snapshot.findings {
        match &finding.data {
            Some(FindingData::Subdomain(entry)) => osint.subdomains.push(entry.clone()),
            Some(FindingData::Port(entry)) => osint.open_ports.push(entry.clone()),
            Some(FindingData::Technology(tech)) => osint.technologies.push(tech.clone()),
            Some(FindingData::Whois { fields }) => {
                for (key, value) in fields {
                    osint.whois.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            Some(FindingData::Dns {
                record_type,
                values,
            }) => {
                osint
                    .dns
                    .entry(record_type.clone())
                    .or_default()
                    .extend(values.iter().cloned());
            }
            None => {}
        }
    }
    osint
}

fn format_duration(total_secs: u64) -> String {
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{
        Finding, ModuleFailure, ModuleId, PortEntry, ScanStatus, SubdomainEntry, Technology,
    };
    use chrono::Utc;
    use std::collections::BTreeMap;

    struct FailingGenerator;

    #[async_trait]
    impl SummaryGenerator for FailingGenerator {
        async fn generate(&self, _report: &Report) -> Result<String, SummaryError> {
            Err(SummaryError::Generation("upstream unavailable".into()))
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl SummaryGenerator for SlowGenerator {
        async fn generate(&self, _report: &Report) -> Result<String, SummaryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".into())
        }
    }

    fn sample_snapshot() -> ScanSnapshot {
        let findings = vec![
            Finding::new(
                FindingKind::Subdomain,
                Severity::Info,
                "Subdomain discovered",
                "Found subdomain: www.example.com",
                "www.example.com",
            )
            .with_data(FindingData::Subdomain(SubdomainEntry {
                name: "www.example.com".into(),
                ip: Some("203.0.113.7".into()),
                status: "active".into(),
            })),
            Finding::new(
                FindingKind::Port,
                Severity::Medium,
                "Open port detected",
                "Port 22 (SSH) is open and accessible",
                "example.com:22",
            )
            .with_data(FindingData::Port(PortEntry {
                host: "example.com".into(),
                port: 22,
                service: "SSH".into(),
                state: "open".into(),
            })),
            Finding::new(
                FindingKind::Technology,
                Severity::Info,
                "Technology detected: nginx",
                "nginx 1.18.0",
                "example.com",
            )
            .with_data(FindingData::Technology(Technology {
                name: "nginx".into(),
                category: "Web Server".into(),
                version: Some("1.18.0".into()),
            })),
            Finding::new(
                FindingKind::Vulnerability,
                Severity::Medium,
                "HSTS Header Missing",
                "The Strict-Transport-Security header is not set",
                "example.com",
            ),
            Finding::new(
                FindingKind::Vulnerability,
                Severity::Critical,
                "Exposed .env file",
                "Environment file readable",
                "https://example.com/.env",
            ),
            Finding::new(
                FindingKind::Whois,
                Severity::Info,
                "WHOIS registration data",
                "Registrar: Example Registrar, LLC",
                "example.com",
            )
            .with_data(FindingData::Whois {
                fields: BTreeMap::from([(
                    "Registrar".to_string(),
                    "Example Registrar, LLC".to_string(),
                )]),
            }),
            Finding::new(
                FindingKind::Dns,
                Severity::Info,
                "DNS MX records",
                "MX records for example.com",
                "example.com",
            )
            .with_data(FindingData::Dns {
                record_type: "MX".into(),
                values: vec!["10 mail.example.com.".into()],
            }),
        ];
        let start = Utc::now();
        ScanSnapshot {
            target: "example.com".into(),
            status: ScanStatus::Completed,
            started_at: Some(start),
            ended_at: Some(start + chrono::Duration::seconds(95)),
            findings,
            module_errors: vec![],
        }
    }

    #[tokio::test]
    async fn compile_rejects_non_terminal_snapshots() {
        let mut snapshot = sample_snapshot();
        snapshot.status = ScanStatus::Running;
        let result =
            ReportCompiler::compile(&snapshot, &TemplateSummaryGenerator, Duration::from_secs(1))
                .await;
        assert!(matches!(
            result,
            Err(ScanError::IncompleteRun(ScanStatus::Running))
        ));
    }

    #[tokio::test]
    async fn osint_data_is_grouped_from_typed_payloads() {
        let report = ReportCompiler::compile(
            &sample_snapshot(),
            &TemplateSummaryGenerator,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(report.osint_data.subdomains.len(), 1);
        assert_eq!(report.osint_data.subdomains[0].name, "www.example.com");
        assert_eq!(report.osint_data.open_ports.len(), 1);
        assert_eq!(report.osint_data.open_ports[0].port, 22);
        assert_eq!(report.osint_data.technologies.len(), 1);
        assert_eq!(
            report.osint_data.whois["Registrar"],
            "Example Registrar, LLC"
        );
        assert_eq!(report.osint_data.dns["MX"], vec!["10 mail.example.com."]);
        assert_eq!(report.scan_duration, "1m 35s");
    }

    #[tokio::test]
    async fn vulnerabilities_are_sorted_by_descending_severity() {
        let report = ReportCompiler::compile(
            &sample_snapshot(),
            &TemplateSummaryGenerator,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        // Critical .env exposure first even though the medium HSTS finding
        // was discovered before it.
        assert_eq!(report.vulnerabilities.len(), 2);
        assert_eq!(report.vulnerabilities[0].title, "Exposed .env file");
        assert_eq!(report.vulnerabilities[0].severity, Severity::Critical);
        assert_eq!(report.vulnerabilities[1].title, "HSTS Header Missing");
        assert_eq!(report.vulnerabilities[1].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn vulnerability_section_carries_only_vulnerability_findings() {
        let snapshot = sample_snapshot();
        let ingested = snapshot
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::Vulnerability)
            .count();
        let report =
            ReportCompiler::compile(&snapshot, &TemplateSummaryGenerator, Duration::from_secs(1))
                .await
                .unwrap();

        // The medium open-port finding must not inflate the count; it stays
        // in the OSINT port group.
        assert_eq!(report.vulnerabilities.len(), ingested);
        assert!(report
            .vulnerabilities
            .iter()
            .all(|f| f.kind == FindingKind::Vulnerability));
        assert_eq!(report.osint_data.open_ports.len(), 1);
    }

    #[tokio::test]
    async fn template_summary_reflects_counts_and_partial_coverage() {
        let mut snapshot = sample_snapshot();
        snapshot.module_errors.push(ModuleFailure {
            module: ModuleId::Osint,
            message: "timed out".into(),
        });
        let report =
            ReportCompiler::compile(&snapshot, &TemplateSummaryGenerator, Duration::from_secs(1))
                .await
                .unwrap();

        let summary = report.summary.unwrap();
        assert!(summary.contains("example.com"));
        assert!(summary.contains("2 issue(s)"));
        assert!(summary.contains("1 critical"));
        assert!(summary.contains("coverage is partial"));
    }

    #[tokio::test]
    async fn failing_generator_degrades_to_fallback_summary() {
        let report = ReportCompiler::compile(
            &sample_snapshot(),
            &FailingGenerator,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(report.summary.as_deref(), Some(FALLBACK_SUMMARY));
    }

    #[tokio::test]
    async fn slow_generator_is_cut_off_at_the_deadline() {
        let report = ReportCompiler::compile(
            &sample_snapshot(),
            &SlowGenerator,
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        assert_eq!(report.summary.as_deref(), Some(FALLBACK_SUMMARY));
    }

    #[tokio::test]
    async fn report_roundtrips_through_json() {
        let report = ReportCompiler::compile(
            &sample_snapshot(),
            &TemplateSummaryGenerator,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        let json = serde_json::to_string_pretty(&report).unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back.target, report.target);
        assert_eq!(back.vulnerabilities.len(), report.vulnerabilities.len());
        assert_eq!(back.osint_data, report.osint_data);
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(95), "1m 35s");
        assert_eq!(format_duration(600), "10m 0s");
    }
}
