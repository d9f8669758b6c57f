// src/core/scanner/osint_scanner.rs

use crate::core::error::ModuleError;
use crate::core::models::{Finding, FindingData, FindingKind, ModuleId, Severity};
use crate::core::scanner::{ScanContext, ScanModule};
use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::RecordType;
use std::collections::BTreeMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// WHOIS fields worth carrying into the report.
const WHOIS_FIELDS: &[&str] = &[
    "Domain Name",
    "Registrar",
    "Creation Date",
    "Registry Expiry Date",
    "Updated Date",
    "Domain Status",
    "DNSSEC",
];

pub struct OsintScanner;

#[async_trait]
impl ScanModule for OsintScanner {
    fn id(&self) -> ModuleId {
        ModuleId::Osint
    }

    fn phase_label(&self) -> &'static str {
        "Gathering OSINT data..."
    }

    async fn run(&self, ctx: &ScanContext) -> Result<(), ModuleError> {
        // Record lookups and WHOIS apply to the registrable domain.
        let domain = base_domain(ctx.target());
        info!(target = %domain, "Starting OSINT aggregation.");

        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

        for record_type in [
            RecordType::A,
            RecordType::MX,
            RecordType::NS,
            RecordType::TXT,
            RecordType::CAA,
        ] {
            if ctx.is_cancelled() {
                return Ok(());
            }
            match resolver.lookup(domain.clone(), record_type).await {
                Ok(lookup) => {
                    let values: Vec<String> = lookup.iter().map(|r| r.to_string()).collect();
                    if values.is_empty() {
                        continue;
                    }
                    debug!(record_type = %record_type, count = values.len(), "records found");
                    let finding = Finding::new(
                        FindingKind::Dns,
                        Severity::Info,
                        format!("DNS {record_type} records"),
                        format!("{record_type} records for {domain}: {}", values.join(", ")),
                        &domain,
                    )
                    .with_data(FindingData::Dns {
                        record_type: record_type.to_string(),
                        values,
                    });
                    ctx.emit(finding).await;
                }
                Err(e) => {
                    // Absent record types are the normal case for most zones.
                    debug!(record_type = %record_type, error = %e, "lookup returned nothing");
                }
            }
        }

        if ctx.is_cancelled() {
            return Ok(());
        }

        match whois_query(&domain, ctx).await {
            Ok(fields) if !fields.is_empty() => {
                let summary = fields
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                let finding = Finding::new(
                    FindingKind::Whois,
                    Severity::Info,
                    "WHOIS registration data",
                    summary,
                    &domain,
                )
                .with_data(FindingData::Whois { fields });
                ctx.emit(finding).await;
            }
            Ok(_) => debug!(domain = %domain, "WHOIS response carried no recognized fields"),
            Err(e) => {
                // WHOIS is best-effort; DNS findings above still stand.
                warn!(domain = %domain, error = %e, "WHOIS query failed");
            }
        }

        info!("OSINT aggregation finished.");
        Ok(())
    }
}

/// Last two labels of the host, the registrable domain for common TLDs.
fn base_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        host.to_string()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

/// Two-step WHOIS: ask IANA for the registry server responsible for the
/// TLD, then query that server for the domain itself.
async fn whois_query(
    domain: &str,
    ctx: &ScanContext,
) -> Result<BTreeMap<String, String>, ModuleError> {
    let iana_response = whois_request("whois.iana.org", domain, ctx).await?;
    let referral = iana_response
        .lines()
        .find_map(|line| line.strip_prefix("refer:"))
        .map(|s| s.trim().to_string());

    let Some(server) = referral else {
        debug!(domain, "no WHOIS referral for TLD");
        return Ok(parse_whois_fields(&iana_response));
    };

    if ctx.is_cancelled() {
        return Ok(BTreeMap::new());
    }

    debug!(server = %server, "following WHOIS referral");
    let response = whois_request(&server, domain, ctx).await?;
    Ok(parse_whois_fields(&response))
}

async fn whois_request(
    server: &str,
    query: &str,
    ctx: &ScanContext,
) -> Result<String, ModuleError> {
    let timeout = ctx.config().probe_timeout();
    let mut stream =
        tokio::time::timeout(timeout, TcpStream::connect((server, 43)))
            .await
            .map_err(|_| ModuleError::Timeout(timeout))??;
    stream.write_all(format!("{query}\r\n").as_bytes()).await?;

    let mut response = Vec::new();
    tokio::time::timeout(timeout, stream.read_to_end(&mut response))
        .await
        .map_err(|_| ModuleError::Timeout(timeout))??;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

/// Extracts "Key: Value" lines for the fields of interest. Name servers are
/// collected into one comma-joined entry.
fn parse_whois_fields(response: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let mut name_servers = Vec::new();

    for line in response.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if key.eq_ignore_ascii_case("Name Server") || key.eq_ignore_ascii_case("nserver") {
            name_servers.push(value.to_lowercase());
            continue;
        }
        for wanted in WHOIS_FIELDS {
            if key.eq_ignore_ascii_case(wanted) && !fields.contains_key(*wanted) {
                fields.insert(wanted.to_string(), value.to_string());
            }
        }
    }

    if !name_servers.is_empty() {
        fields.insert("Name Servers".to_string(), name_servers.join(", "));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_domain_strips_subdomains() {
        assert_eq!(base_domain("www.example.com"), "example.com");
        assert_eq!(base_domain("a.b.example.com"), "example.com");
        assert_eq!(base_domain("example.com"), "example.com");
        assert_eq!(base_domain("localhost"), "localhost");
    }

    #[test]
    fn whois_fields_are_extracted_first_wins() {
        let response = "\
Domain Name: EXAMPLE.COM
Registrar: Example Registrar, LLC
Registrar: Second Registrar
Name Server: NS1.EXAMPLE.COM
Name Server: NS2.EXAMPLE.COM
DNSSEC: unsigned
% comment line without colon value:
Creation Date: 1995-08-14T04:00:00Z
";
        let fields = parse_whois_fields(response);
        assert_eq!(fields["Domain Name"], "EXAMPLE.COM");
        assert_eq!(fields["Registrar"], "Example Registrar, LLC");
        assert_eq!(fields["Name Servers"], "ns1.example.com, ns2.example.com");
        assert_eq!(fields["Creation Date"], "1995-08-14T04:00:00Z");
        assert!(!fields.contains_key("Registry Expiry Date"));
    }
}
