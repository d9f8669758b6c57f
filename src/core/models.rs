// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

// --- Severity ---

/// Severity tier of a finding, ordered by risk.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Maps a CVSS-style 0.0-10.0 score to a severity tier.
    ///
    /// Threshold table (aligned with CVSS 3.x qualitative ratings):
    /// >= 9.0 Critical, >= 7.0 High, >= 4.0 Medium, >= 0.1 Low, else Info.
    pub fn from_score(score: f32) -> Self {
        match score {
            s if s >= 9.0 => Severity::Critical,
            s if s >= 7.0 => Severity::High,
            s if s >= 4.0 => Severity::Medium,
            s if s >= 0.1 => Severity::Low,
            _ => Severity::Info,
        }
    }

    /// Numeric rank, used as an index into the store's tally table.
    pub fn as_index(&self) -> usize {
        match self {
            Severity::Info => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// All tiers in ascending risk order.
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// --- Finding ---

/// Category of a discovered fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FindingKind {
    Subdomain,
    Port,
    Technology,
    Vulnerability,
    Ssl,
    Whois,
    Dns,
}

/// Structured payload attached to a finding, preserved losslessly so the
/// report compiler can group OSINT data without re-parsing display strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FindingData {
    Subdomain(SubdomainEntry),
    Port(PortEntry),
    Technology(Technology),
    Whois { fields: BTreeMap<String, String> },
    Dns { record_type: String, values: Vec<String> },
}

/// A discovered subdomain and the address it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainEntry {
    pub name: String,
    pub ip: Option<String>,
    pub status: String,
}

/// An open port observed on a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    pub host: String,
    pub port: u16,
    pub service: String,
    pub state: String,
}

/// A detected technology (e.g., a web framework or CMS).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Technology {
    pub name: String,
    pub category: String,
    pub version: Option<String>,
}

/// One normalized discovered fact. Immutable once ingested into the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub kind: FindingKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// The specific host/URL/port this finding concerns. May differ from the
    /// overall scan target (e.g., a discovered subdomain).
    pub target: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    /// Weakness class identifier, e.g. a CWE id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weakness: Option<String>,
    /// Numeric severity score in [0.0, 10.0]. Consistency with the severity
    /// tier is the emitting module's responsibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<FindingData>,
}

impl Finding {
    pub fn new(
        kind: FindingKind,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            title: title.into(),
            description: description.into(),
            target: target.into(),
            timestamp: Utc::now(),
            solution: None,
            weakness: None,
            score: None,
            data: None,
        }
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }

    pub fn with_weakness(mut self, weakness: impl Into<String>) -> Self {
        self.weakness = Some(weakness.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score.clamp(0.0, 10.0));
        self
    }

    pub fn with_data(mut self, data: FindingData) -> Self {
        self.data = Some(data);
        self
    }

    /// Deduplication key: two findings with the same kind, target and title
    /// describe the same fact.
    pub fn dedup_key(&self) -> (FindingKind, String, String) {
        (self.kind, self.target.clone(), self.title.clone())
    }
}

// --- Module selection ---

/// Identifier of a scan module. Declaration order is the fixed phase order
/// used for progress labeling.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ModuleId {
    Subdomain,
    PortScan,
    TechDetection,
    Vulnerability,
    DirBruteforce,
    Ssl,
    Osint,
}

// --- Run state ---

/// Lifecycle status of one scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanStatus {
    Idle,
    Running,
    Completed,
    Stopped,
    Error,
}

impl ScanStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Stopped | ScanStatus::Error
        )
    }
}

/// Observable progress of a run: current phase label, fractional completion
/// and lifecycle status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub status: ScanStatus,
    pub phase: String,
    pub fraction: f64,
}

impl Progress {
    pub fn idle() -> Self {
        Self {
            status: ScanStatus::Idle,
            phase: String::new(),
            fraction: 0.0,
        }
    }
}

/// A module that failed during a run. Recorded as data so a partial run
/// still produces a complete report with failed modules identifiable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFailure {
    pub module: ModuleId,
    pub message: String,
}

/// Immutable copy of a run's state, taken from a
/// [`crate::core::orchestrator::ScanHandle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub target: String,
    pub status: ScanStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Discovery order is preserved.
    pub findings: Vec<Finding>,
    pub module_errors: Vec<ModuleFailure>,
}

// --- Report ---

/// Open-source-intelligence findings grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsintData {
    pub subdomains: Vec<SubdomainEntry>,
    pub open_ports: Vec<PortEntry>,
    pub technologies: Vec<Technology>,
    pub whois: BTreeMap<String, String>,
    pub dns: BTreeMap<String, Vec<String>>,
}

/// Final report artifact. A pure derived snapshot, never mutated after
/// compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub target: String,
    pub scan_date: DateTime<Utc>,
    pub scan_duration: String,
    /// Vulnerability findings ordered by descending severity, then by
    /// discovery order.
    pub vulnerabilities: Vec<Finding>,
    pub osint_data: OsintData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub module_errors: Vec<ModuleFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_threshold_table() {
        assert_eq!(Severity::from_score(9.8), Severity::Critical);
        assert_eq!(Severity::from_score(9.0), Severity::Critical);
        assert_eq!(Severity::from_score(7.5), Severity::High);
        assert_eq!(Severity::from_score(5.3), Severity::Medium);
        assert_eq!(Severity::from_score(2.0), Severity::Low);
        assert_eq!(Severity::from_score(0.0), Severity::Info);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
    }

    #[test]
    fn finding_ids_are_unique() {
        let a = Finding::new(FindingKind::Port, Severity::Info, "t", "d", "x");
        let b = Finding::new(FindingKind::Port, Severity::Info, "t", "d", "x");
        assert_ne!(a.id, b.id);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn score_is_clamped() {
        let f = Finding::new(FindingKind::Vulnerability, Severity::High, "t", "d", "x")
            .with_score(12.0);
        assert_eq!(f.score, Some(10.0));
    }

    #[test]
    fn finding_roundtrips_through_json() {
        let f = Finding::new(
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
        }));

        let json = serde_json::to_string(&f).unwrap();
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, f.id);
        assert_eq!(back.data, f.data);
    }

    #[test]
    fn module_id_parses_from_kebab_case() {
        use std::str::FromStr;
        assert_eq!(ModuleId::from_str("port-scan").unwrap(), ModuleId::PortScan);
        assert_eq!(ModuleId::from_str("ssl").unwrap(), ModuleId::Ssl);
        assert!(ModuleId::from_str("bogus").is_err());
    }
}
