// src/main.rs

use clap::Parser;
use std::collections::BTreeSet;
use strum::IntoEnumIterator;
use tracing::info;
use webraptor::core::config::ScanConfig;
use webraptor::core::models::{ModuleId, Report, ScanStatus, Severity};
use webraptor::core::orchestrator::Orchestrator;
use webraptor::core::report::{ReportCompiler, TemplateSummaryGenerator};
use webraptor::logging::initialize_logging;

#[derive(Parser)]
#[command(name = "webraptor", version, about = "Reconnaissance and vulnerability scanner")]
struct Cli {
    /// Target host or URL to scan
    target: String,

    /// Comma-separated modules to run (default: all). Valid values:
    /// subdomain, port-scan, tech-detection, vulnerability, dir-bruteforce,
    /// ssl, osint
    #[arg(short, long, value_delimiter = ',')]
    modules: Vec<ModuleId>,

    /// Print the compiled report as JSON instead of the human summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    initialize_logging()?;
    let cli = Cli::parse();

    let selection: BTreeSet<ModuleId> = if cli.modules.is_empty() {
        ModuleId::iter().collect()
    } else {
        cli.modules.iter().copied().collect()
    };

    let config = ScanConfig::default();
    let summary_timeout = config.summary_timeout();
    let orchestrator = Orchestrator::new(config);
    let mut handle = orchestrator.start_scan(&cli.target, &selection)?;
    info!(target = %handle.target(), "scan started from CLI");

    // Ctrl-C stops the run cooperatively; partial findings still get a report.
    let canceller = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping scan...");
            canceller.cancel();
        }
    });

    let mut progress = handle.progress();
    let progress_task = tokio::spawn(async move {
        loop {
            let p = progress.borrow_and_update().clone();
            if p.status != ScanStatus::Idle {
                eprintln!("[{:>5.1}%] {}", p.fraction * 100.0, p.phase);
            }
            if p.status.is_terminal() {
                break;
            }
            if progress.changed().await.is_err() {
                break;
            }
        }
    });

    handle.wait().await;
    let _ = progress_task.await;

    let snapshot = handle.snapshot();
    let report =
        ReportCompiler::compile(&snapshot, &TemplateSummaryGenerator, summary_timeout).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &Report) {
    println!("\n=== Scan report: {} ===", report.target);
    println!("Date: {}  Duration: {}", report.scan_date.format("%Y-%m-%d %H:%M UTC"), report.scan_duration);
    if let Some(summary) = &report.summary {
        println!("\n{summary}");
    }

    if !report.vulnerabilities.is_empty() {
        println!("\nFindings ({}):", report.vulnerabilities.len());
        for finding in &report.vulnerabilities {
            let score = finding
                .score
                .map(|s| format!(" (score {s:.1})"))
                .unwrap_or_default();
            println!(
                "  [{}]{} {} — {}",
                finding.severity.to_string().to_uppercase(),
                score,
                finding.title,
                finding.target
            );
            if finding.severity >= Severity::High {
                if let Some(solution) = &finding.solution {
                    println!("      fix: {solution}");
                }
            }
        }
    }

    let osint = &report.osint_data;
    if !osint.subdomains.is_empty() {
        println!("\nSubdomains:");
        for sub in &osint.subdomains {
            println!("  {} ({})", sub.name, sub.ip.as_deref().unwrap_or("unresolved"));
        }
    }
    if !osint.open_ports.is_empty() {
        println!("\nOpen ports:");
        for port in &osint.open_ports {
            println!("  {}:{} {}", port.host, port.port, port.service);
        }
    }
    if !osint.technologies.is_empty() {
        println!("\nTechnologies:");
        for tech in &osint.technologies {
            match &tech.version {
                Some(v) => println!("  {} {} ({})", tech.name, v, tech.category),
                None => println!("  {} ({})", tech.name, tech.category),
            }
        }
    }
    if !osint.whois.is_empty() {
        println!("\nWHOIS:");
        for (key, value) in &osint.whois {
            println!("  {key}: {value}");
        }
    }
    if !osint.dns.is_empty() {
        println!("\nDNS records:");
        for (record_type, values) in &osint.dns {
            println!("  {record_type}: {}", values.join(", "));
        }
    }

    if !report.module_errors.is_empty() {
        println!("\nModules with errors:");
        for err in &report.module_errors {
            println!("  {}: {}", err.module, err.message);
        }
    }
}
