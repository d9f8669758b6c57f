//! Static, read-only database of classifiable security findings.
//!
//! Modules that detect misconfigurations (missing headers, certificate
//! problems, exposed paths) look their finding up here by code, so severity,
//! score, weakness class and remediation text stay consistent across modules
//! and are easy to maintain in one place.

use crate::core::models::{Finding, FindingKind, Severity};

/// Everything needed to turn a detection code into a presentable finding.
pub struct FindingDetail {
    /// Machine-readable identifier, e.g. "HEADERS_CSP_MISSING".
    pub code: &'static str,
    pub title: &'static str,
    pub kind: FindingKind,
    pub severity: Severity,
    /// CVSS-style score, consistent with the severity tier by construction
    /// of this table.
    pub score: f32,
    /// Weakness class (CWE identifier).
    pub weakness: &'static str,
    pub description: &'static str,
    pub remediation: &'static str,
}

static FINDINGS: &[FindingDetail] = &[
    // --- HTTP security headers ---
    FindingDetail {
        code: "HEADERS_HSTS_MISSING",
        title: "HSTS Header Missing",
        kind: FindingKind::Vulnerability,
        severity: Severity::Medium,
        score: 5.3,
        weakness: "CWE-319",
        description: "The Strict-Transport-Security header is not set. Browsers may contact the site over plain HTTP, exposing sessions to protocol downgrade attacks and cookie hijacking.",
        remediation: "Send 'Strict-Transport-Security: max-age=31536000; includeSubDomains' on every HTTPS response.",
    },
    FindingDetail {
        code: "HEADERS_CSP_MISSING",
        title: "Content-Security-Policy Missing",
        kind: FindingKind::Vulnerability,
        severity: Severity::Medium,
        score: 5.3,
        weakness: "CWE-693",
        description: "No Content-Security-Policy header is set. CSP is a strong mitigation against cross-site scripting and data injection, restricting which resources the browser may load.",
        remediation: "Define a restrictive Content-Security-Policy header and relax it only where the application requires it.",
    },
    FindingDetail {
        code: "HEADERS_X_FRAME_OPTIONS_MISSING",
        title: "X-Frame-Options Missing",
        kind: FindingKind::Vulnerability,
        severity: Severity::Medium,
        score: 4.3,
        weakness: "CWE-1021",
        description: "The X-Frame-Options header is not set, leaving visitors exposed to clickjacking via an attacker-controlled iframe.",
        remediation: "Send 'X-Frame-Options: DENY' or 'SAMEORIGIN', or an equivalent frame-ancestors CSP directive.",
    },
    FindingDetail {
        code: "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING",
        title: "X-Content-Type-Options Missing",
        kind: FindingKind::Vulnerability,
        severity: Severity::Low,
        score: 3.1,
        weakness: "CWE-430",
        description: "The X-Content-Type-Options header is not set, so browsers may MIME-sniff responses and execute files that were not meant to be scripts.",
        remediation: "Send 'X-Content-Type-Options: nosniff' on all responses.",
    },
    FindingDetail {
        code: "SERVER_VERSION_DISCLOSURE",
        title: "Server Version Disclosure",
        kind: FindingKind::Vulnerability,
        severity: Severity::Low,
        score: 2.7,
        weakness: "CWE-200",
        description: "The Server header reveals the exact software version in use, simplifying the search for version-specific exploits.",
        remediation: "Configure the web server to omit or genericize its version banner.",
    },
    // --- SSL/TLS ---
    FindingDetail {
        code: "SSL_HANDSHAKE_FAILED",
        title: "TLS Handshake Failed",
        kind: FindingKind::Ssl,
        severity: Severity::High,
        score: 7.4,
        weakness: "CWE-295",
        description: "A secure TLS connection could not be established. Possible causes include an invalid or missing certificate, unsupported cipher suites, or a server misconfiguration.",
        remediation: "Install a valid certificate for the exact hostname and verify the TLS configuration with a dedicated analyzer.",
    },
    FindingDetail {
        code: "SSL_EXPIRED",
        title: "SSL Certificate Expired",
        kind: FindingKind::Ssl,
        severity: Severity::Critical,
        score: 9.1,
        weakness: "CWE-295",
        description: "The certificate presented by the server is outside its validity window. Browsers will block access and users can no longer authenticate the site.",
        remediation: "Renew the certificate immediately and automate renewal (e.g., ACME/Let's Encrypt) to prevent recurrence.",
    },
    FindingDetail {
        code: "SSL_EXPIRING_SOON",
        title: "SSL Certificate Expiring Soon",
        kind: FindingKind::Ssl,
        severity: Severity::Medium,
        score: 4.0,
        weakness: "CWE-295",
        description: "The certificate expires within 30 days. This is an early warning to prevent service disruption.",
        remediation: "Renew the certificate before expiry; if renewal is automated, verify the automation is healthy.",
    },
    FindingDetail {
        code: "SSL_NO_CERTIFICATE",
        title: "No Peer Certificate Presented",
        kind: FindingKind::Ssl,
        severity: Severity::High,
        score: 7.4,
        weakness: "CWE-295",
        description: "The TLS handshake succeeded but the server presented no certificate, so its identity cannot be verified.",
        remediation: "Configure the server to present a full certificate chain for the served hostname.",
    },
    // --- Exposed paths ---
    FindingDetail {
        code: "DIR_ENV_FILE_EXPOSED",
        title: "Environment File Exposed",
        kind: FindingKind::Vulnerability,
        severity: Severity::Critical,
        score: 9.8,
        weakness: "CWE-538",
        description: "A .env file is publicly reachable. These files commonly contain database credentials, API keys and signing secrets.",
        remediation: "Block access to dotfiles at the web server and rotate any credentials the file contained.",
    },
    FindingDetail {
        code: "DIR_GIT_EXPOSED",
        title: "Git Repository Metadata Exposed",
        kind: FindingKind::Vulnerability,
        severity: Severity::High,
        score: 7.5,
        weakness: "CWE-538",
        description: "The .git directory is publicly reachable, allowing full reconstruction of the application source and its history.",
        remediation: "Deny access to the .git directory at the web server, or deploy build artifacts instead of a working tree.",
    },
    FindingDetail {
        code: "DIR_PHPINFO_EXPOSED",
        title: "phpinfo Page Exposed",
        kind: FindingKind::Vulnerability,
        severity: Severity::High,
        score: 7.5,
        weakness: "CWE-200",
        description: "A phpinfo() page is publicly reachable, disclosing PHP configuration, loaded modules, environment variables and file paths.",
        remediation: "Remove diagnostic pages from production deployments.",
    },
    FindingDetail {
        code: "DIR_ADMIN_EXPOSED",
        title: "Administrative Interface Reachable",
        kind: FindingKind::Vulnerability,
        severity: Severity::Medium,
        score: 5.3,
        weakness: "CWE-419",
        description: "An administrative interface answers on a well-known path and is reachable from the public internet.",
        remediation: "Restrict administrative paths by network origin or an authentication proxy.",
    },
    FindingDetail {
        code: "DIR_SERVER_STATUS_EXPOSED",
        title: "Server Status Page Exposed",
        kind: FindingKind::Vulnerability,
        severity: Severity::Medium,
        score: 5.3,
        weakness: "CWE-200",
        description: "A server status endpoint is publicly reachable, disclosing active requests, client addresses and internal URLs.",
        remediation: "Limit status endpoints to localhost or an internal management network.",
    },
    FindingDetail {
        code: "DIR_BACKUP_EXPOSED",
        title: "Backup Artifact Exposed",
        kind: FindingKind::Vulnerability,
        severity: Severity::High,
        score: 7.5,
        weakness: "CWE-538",
        description: "A backup or archive artifact is publicly downloadable and may contain source code or data snapshots.",
        remediation: "Remove backup artifacts from the web root and store them outside publicly served paths.",
    },
];

/// Looks up the full detail for a detection code.
pub fn get_finding_detail(code: &str) -> Option<&'static FindingDetail> {
    FINDINGS.iter().find(|f| f.code == code)
}

impl FindingDetail {
    /// Instantiates a finding from this table entry against a concrete target.
    pub fn to_finding(&self, target: impl Into<String>) -> Finding {
        Finding::new(
            self.kind,
            self.severity,
            self.title,
            self.description,
            target,
        )
        .with_solution(self.remediation)
        .with_weakness(self.weakness)
        .with_score(self.score)
    }
}
