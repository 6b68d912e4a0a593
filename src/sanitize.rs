//! Endpoint redaction for telemetry.
//!
//! Proxy addresses and obfuscation-service URLs carry secrets (fronting
//! domains, tunnel credentials). Before any URL-shaped value reaches the
//! event sink it is reduced here to a short representative fragment.

use tracing::debug;
use url::Url;

use crate::endpoint::ServiceTag;

/// Reduce `url` to a loggable fragment for the given service.
///
/// Total over all inputs: parse and index failures are absorbed and yield an
/// empty string, never a panic or an error. The raw URL itself is never
/// logged here.
pub fn sanitize_url(url: &str, service: ServiceTag) -> String {
    let sanitized = match service {
        ServiceTag::Update => update_fragment(url),
        ServiceTag::Envoy => query_fragments(url, QueryRule::Envoy),
        ServiceTag::Snowflake => query_fragments(url, QueryRule::Snowflake),
        ServiceTag::Https | ServiceTag::Direct => domain_fragment(url),
        ServiceTag::Unknown => None,
    }
    .unwrap_or_default();

    if sanitized.is_empty() {
        debug!(service = service.as_str(), "failed to sanitize url");
    } else {
        debug!(service = service.as_str(), "sanitized url");
    }
    sanitized
}

/// Update-source URLs embed a numeric id as the second-to-last path segment.
fn update_fragment(url: &str) -> Option<String> {
    let parts: Vec<&str> = url.split('/').collect();
    if parts.len() < 2 {
        return None;
    }
    Some(parts[parts.len() - 2].to_string())
}

/// Domain fragment between the first `.` and the `/` that follows it.
fn domain_fragment(url: &str) -> Option<String> {
    let dot = url.find('.')?;
    let slash = url[dot..].find('/')? + dot;
    Some(url[dot + 1..slash].to_string())
}

enum QueryRule {
    /// Accumulate `url` (dot to `%2F`) and `address` values, comma-separated.
    Envoy,
    /// First `url` value only, dot to literal `/`.
    Snowflake,
}

fn query_fragments(url: &str, rule: QueryRule) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let raw_query = parsed.query()?;

    let mut out = String::new();
    for pair in raw_query.split('&') {
        let (key, value) = match pair.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        match rule {
            QueryRule::Envoy => {
                if key == "url" {
                    push_fragment(&mut out, &embedded_domain(value, "%2F")?);
                } else if key == "address" {
                    push_fragment(&mut out, value);
                }
            }
            QueryRule::Snowflake => {
                if key == "url" {
                    return Some(embedded_domain(value, "/")?);
                }
            }
        }
    }

    if out.is_empty() { None } else { Some(out) }
}

/// Substring of `value` between its first `.` and the first `boundary` after
/// that dot. None when either delimiter is missing.
fn embedded_domain(value: &str, boundary: &str) -> Option<String> {
    let dot = value.find('.')?;
    let end = value[dot..].find(boundary)? + dot;
    Some(value[dot + 1..end].to_string())
}

fn push_fragment(out: &mut String, fragment: &str) {
    if !out.is_empty() {
        out.push(',');
    }
    out.push_str(fragment);
}
