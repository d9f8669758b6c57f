// src/core/scanner/fingerprint_scanner.rs

use crate::core::error::ModuleError;
use crate::core::models::{Finding, FindingData, FindingKind, ModuleId, Severity, Technology};
use crate::core::scanner::{ScanContext, ScanModule};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::{debug, info};

/// The different places a technology signature can show up.
enum Check<'a> {
    /// Pattern in a specific HTTP header.
    Header(&'a str, &'a Lazy<Regex>),
    /// Pattern in the content of a named meta tag.
    MetaTag(&'a str, &'a Lazy<Regex>),
    /// Pattern anywhere in the HTML body.
    Body(&'a Lazy<Regex>),
    /// Pattern in the `src` attribute of `<script>` tags.
    ScriptSrc(&'a Lazy<Regex>),
    /// Pattern in the `href` attribute of `<link>` tags.
    LinkHref(&'a Lazy<Regex>),
    /// Pattern in `set-cookie` headers.
    Cookie(&'a Lazy<Regex>),
}

struct FingerprintRule<'a> {
    tech_name: &'a str,
    category: &'a str,
    check: Check<'a>,
}

// Statically compiled regexes. The first capture group, when present,
// extracts the version.
static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"nginx/([\d\.]+)").unwrap());
static RE_NGINX_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<hr><center>nginx</center>").unwrap());
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache/([\d\.]+)").unwrap());
static RE_APACHE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache Server at").unwrap());
static RE_CLOUDFLARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"cloudflare").unwrap());
static RE_LITESPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"LiteSpeed").unwrap());
static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"WordPress ([\d\.]+)").unwrap());
static RE_WP_EMBED: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wp-content/|/wp-includes/").unwrap());
static RE_JOOMLA: Lazy<Regex> = Lazy::new(|| Regex::new(r"Joomla!").unwrap());
static RE_SHOPIFY: Lazy<Regex> = Lazy::new(|| Regex::new(r"shopify").unwrap());
static RE_MAGENTO: Lazy<Regex> = Lazy::new(|| Regex::new(r"magento").unwrap());
static RE_PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHP/([\d\.]+)").unwrap());
static RE_PHPSESSID: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHPSESSID").unwrap());
static RE_ASPNET: Lazy<Regex> = Lazy::new(|| Regex::new(r"ASP\.NET").unwrap());
static RE_JSESSIONID: Lazy<Regex> = Lazy::new(|| Regex::new(r"JSESSIONID").unwrap());
static RE_DJANGO_CSRF: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrftoken").unwrap());
static RE_RAILS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_rails_session").unwrap());
static RE_NEXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Next\.js ([\d\.]+)").unwrap());
static RE_NEXTJS_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/_next/static/").unwrap());
static RE_NUXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"__NUXT__").unwrap());
static RE_ANGULAR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"ng-version="([\d\.]+)""#).unwrap());
static RE_SVELTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"class=["']svelte-"#).unwrap());
static RE_GATSBY: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id=["']___gatsby["']"#).unwrap());
static RE_ASTRO: Lazy<Regex> = Lazy::new(|| Regex::new(r"Astro v([\d\.]+)").unwrap());
static RE_JQUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"jquery[\.min|\.slim|\.js|/](-|\?v=)?([\d\.]+)").unwrap());
static RE_REACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"react-dom|data-reactroot|react\.development").unwrap());
static RE_VUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-v-app|__VUE_").unwrap());
static RE_BOOTSTRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"bootstrap.min.css").unwrap());
static RE_GOOGLE_ANALYTICS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"google-analytics.com/|googletagmanager.com/").unwrap());

static RULES: &[FingerprintRule] = &[
    FingerprintRule { tech_name: "Nginx", category: "Web Server", check: Check::Header("server", &RE_NGINX) },
    FingerprintRule { tech_name: "Nginx", category: "Web Server", check: Check::Body(&RE_NGINX_ERROR) },
    FingerprintRule { tech_name: "Apache", category: "Web Server", check: Check::Header("server", &RE_APACHE) },
    FingerprintRule { tech_name: "Apache", category: "Web Server", check: Check::Body(&RE_APACHE_ERROR) },
    FingerprintRule { tech_name: "Cloudflare", category: "CDN / WAF", check: Check::Header("server", &RE_CLOUDFLARE) },
    FingerprintRule { tech_name: "LiteSpeed", category: "Web Server", check: Check::Header("server", &RE_LITESPEED) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::MetaTag("generator", &RE_WORDPRESS) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::Body(&RE_WP_EMBED) },
    FingerprintRule { tech_name: "Joomla", category: "CMS", check: Check::MetaTag("generator", &RE_JOOMLA) },
    FingerprintRule { tech_name: "Shopify", category: "E-commerce", check: Check::Header("x-shopid", &RE_SHOPIFY) },
    FingerprintRule { tech_name: "Magento", category: "E-commerce", check: Check::Cookie(&RE_MAGENTO) },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Header("x-powered-by", &RE_PHP) },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Cookie(&RE_PHPSESSID) },
    FingerprintRule { tech_name: "ASP.NET", category: "Framework", check: Check::Header("x-aspnet-version", &RE_ASPNET) },
    FingerprintRule { tech_name: "Java", category: "Language", check: Check::Cookie(&RE_JSESSIONID) },
    FingerprintRule { tech_name: "Python/Django", category: "Framework", check: Check::Cookie(&RE_DJANGO_CSRF) },
    FingerprintRule { tech_name: "Ruby on Rails", category: "Framework", check: Check::Cookie(&RE_RAILS) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", check: Check::Header("x-powered-by", &RE_NEXTJS) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", check: Check::ScriptSrc(&RE_NEXTJS_SCRIPT) },
    FingerprintRule { tech_name: "Nuxt.js", category: "JS Framework", check: Check::Body(&RE_NUXTJS) },
    FingerprintRule { tech_name: "Angular", category: "JS Framework", check: Check::Body(&RE_ANGULAR) },
    FingerprintRule { tech_name: "Svelte", category: "JS Framework", check: Check::Body(&RE_SVELTE) },
    FingerprintRule { tech_name: "Gatsby", category: "JS Framework", check: Check::Body(&RE_GATSBY) },
    FingerprintRule { tech_name: "Astro", category: "JS Framework", check: Check::MetaTag("generator", &RE_ASTRO) },
    FingerprintRule { tech_name: "React", category: "JS Library", check: Check::Body(&RE_REACT) },
    FingerprintRule { tech_name: "Vue.js", category: "JS Library", check: Check::Body(&RE_VUE) },
    FingerprintRule { tech_name: "jQuery", category: "JS Library", check: Check::ScriptSrc(&RE_JQUERY) },
    FingerprintRule { tech_name: "Bootstrap", category: "UI Framework", check: Check::LinkHref(&RE_BOOTSTRAP) },
    FingerprintRule { tech_name: "Google Analytics", category: "Analytics", check: Check::ScriptSrc(&RE_GOOGLE_ANALYTICS) },
];

pub struct FingerprintScanner;

#[async_trait]
impl ScanModule for FingerprintScanner {
    fn id(&self) -> ModuleId {
        ModuleId::TechDetection
    }

    fn phase_label(&self) -> &'static str {
        "Detecting technologies..."
    }

    async fn run(&self, ctx: &ScanContext) -> Result<(), ModuleError> {
        info!(target = %ctx.target(), "Starting technology fingerprint scan.");

        let client = ctx.config().http_client()?;
        let url = format!("https://{}", ctx.target());
        let response = client.get(&url).send().await?;
        info!(status = %response.status(), "Received HTTP response.");

        let headers = response.headers().clone();
        let cookies = headers
            .get_all("set-cookie")
            .into_iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        let body = response.text().await?;
        debug!(bytes = body.len(), "Read response body.");

        if ctx.is_cancelled() {
            return Ok(());
        }

        // Rule application is synchronous: the parsed document is not Send,
        // so it must not be held across an await point.
        let technologies = apply_rules(&headers, &cookies, &body);
        info!(count = technologies.len(), "Fingerprint scan finished.");

        for tech in technologies {
            if ctx.is_cancelled() {
                break;
            }
            let description = match &tech.version {
                Some(v) => format!("Detected {} {} ({})", tech.name, v, tech.category),
                None => format!("Detected {} ({})", tech.name, tech.category),
            };
            let finding = Finding::new(
                FindingKind::Technology,
                Severity::Info,
                format!("Technology detected: {}", tech.name),
                description,
                ctx.target(),
            )
            .with_data(FindingData::Technology(tech));
            ctx.emit(finding).await;
        }
        Ok(())
    }
}

/// Applies every fingerprinting rule to the response, merging duplicate
/// matches and preferring the variant that captured a version.
fn apply_rules(headers: &HeaderMap, cookies: &str, body: &str) -> Vec<Technology> {
    let document = Html::parse_document(body);
    let mut found: HashMap<String, Technology> = HashMap::new();

    for rule in RULES {
        let version = match &rule.check {
            Check::Header(name, re) => {
                check_with_regex(headers.get(*name).and_then(|v| v.to_str().ok()), re)
            }
            Check::MetaTag(name, re) => check_meta_tag(&document, name, re),
            Check::Body(re) => check_with_regex(Some(body), re),
            Check::ScriptSrc(re) => check_attr(&document, "script[src]", "src", re),
            Check::LinkHref(re) => check_attr(&document, "link[href]", "href", re),
            Check::Cookie(re) => check_with_regex(Some(cookies), re),
        };

        let Some(version) = version else { continue };
        debug!(tech = rule.tech_name, version = ?version, "rule matched");
        match found.get_mut(rule.tech_name) {
            Some(existing) => {
                if existing.version.is_none() && version.is_some() {
                    existing.version = version;
                }
            }
            None => {
                found.insert(
                    rule.tech_name.to_string(),
                    Technology {
                        name: rule.tech_name.to_string(),
                        category: rule.category.to_string(),
                        version,
                    },
                );
            }
        }
    }

    let mut technologies: Vec<Technology> = found.into_values().collect();
    technologies.sort_by(|a, b| a.name.cmp(&b.name));
    technologies
}

/// `Some(version)` when the regex matches; the inner option carries the
/// first capture group when one was captured and non-empty.
fn check_with_regex(text: Option<&str>, re: &Regex) -> Option<Option<String>> {
    text.and_then(|text| {
        re.captures(text).map(|caps| {
            caps.get(1)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        })
    })
}

fn check_meta_tag(doc: &Html, name: &str, re: &Regex) -> Option<Option<String>> {
    let selector = Selector::parse(&format!("meta[name='{name}']")).ok()?;
    let content = doc
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"));
    check_with_regex(content, re)
}

fn check_attr(doc: &Html, selector: &str, attr: &str, re: &Regex) -> Option<Option<String>> {
    let selector = Selector::parse(selector).ok()?;
    for el in doc.select(&selector) {
        if let Some(value) = el.value().attr(attr) {
            if let Some(version) = check_with_regex(Some(value), re) {
                return Some(version);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_server_header_with_version() {
        let mut headers = HeaderMap::new();
        headers.insert("server", "nginx/1.18.0".parse().unwrap());
        let techs = apply_rules(&headers, "", "<html></html>");
        let nginx = techs.iter().find(|t| t.name == "Nginx").unwrap();
        assert_eq!(nginx.version.as_deref(), Some("1.18.0"));
        assert_eq!(nginx.category, "Web Server");
    }

    #[test]
    fn detects_wordpress_from_generator_meta() {
        let body = r#"<html><head>
            <meta name="generator" content="WordPress 5.9.0">
            </head><body></body></html>"#;
        let techs = apply_rules(&HeaderMap::new(), "", body);
        let wp = techs.iter().find(|t| t.name == "WordPress").unwrap();
        assert_eq!(wp.version.as_deref(), Some("5.9.0"));
    }

    #[test]
    fn body_match_without_version_is_kept() {
        let body = r#"<html><body><div data-reactroot></div></body></html>"#;
        let techs = apply_rules(&HeaderMap::new(), "", body);
        let react = techs.iter().find(|t| t.name == "React").unwrap();
        assert!(react.version.is_none());
    }

    #[test]
    fn cookie_match_detects_php() {
        let techs = apply_rules(&HeaderMap::new(), "PHPSESSID=abc123", "<html></html>");
        assert!(techs.iter().any(|t| t.name == "PHP"));
    }

    #[test]
    fn duplicate_rules_merge_and_prefer_versioned_match() {
        // Both the embed-path rule and the generator rule match WordPress;
        // only the generator carries a version.
        let body = r#"<html><head>
            <meta name="generator" content="WordPress 6.1">
            </head><body><script src="/wp-content/x.js"></script>/wp-includes/</body></html>"#;
        let techs = apply_rules(&HeaderMap::new(), "", body);
        let wp: Vec<_> = techs.iter().filter(|t| t.name == "WordPress").collect();
        assert_eq!(wp.len(), 1);
        assert_eq!(wp[0].version.as_deref(), Some("6.1"));
    }
}
