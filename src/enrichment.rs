//! Enrichment Client (spec.md §4.2).
//!
//! Talks to the upstream geo-IP service, normalizes its payload into an
//! [`EnrichmentRecord`], and surfaces its rate-limit headers. Grounded in
//! the teacher's `origin.rs` `OriginFetcher` (pooled `reqwest::Client`,
//! explicit timeout) but with no retry loop: each failure is cached and
//! surfaced as 503, matching the reference behavior exactly.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use tracing::warn;

const UPSTREAM_FIELDS: &str = "status,continentCode,countryCode,as,reverse,proxy,hosting";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Two-value mirror of the ip-api.com `status` field (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStatus {
    Success,
    Fail,
}

#[derive(Debug, Clone)]
pub struct EnrichmentPayload {
    pub continent: Option<String>,
    pub country: Option<String>,
    pub asn: Option<u32>,
    pub rdns_hostname: Option<String>,
    pub is_hosting: bool,
    pub is_proxy: bool,
    pub upstream_status: UpstreamStatus,
}

/// Result of one enrichment lookup, cached verbatim regardless of outcome.
#[derive(Debug, Clone)]
pub struct EnrichmentRecord {
    pub status_code: u16,
    pub payload: Option<EnrichmentPayload>,
    pub last_updated: i64,
}

impl EnrichmentRecord {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// A record is usable by the Decision Engine only when the transport
    /// succeeded, parsed, and the upstream itself reported success.
    pub fn is_actionable(&self) -> bool {
        matches!(
            &self.payload,
            Some(p) if self.status_code == 200 && p.upstream_status == UpstreamStatus::Success
        )
    }
}

/// Outcome of the rate-limit headers on one lookup response.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// `Some(reset_at)` when the upstream reported `X-Rl: 0`.
    pub exhausted_until: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct EnrichmentClient {
    client: Client,
}

impl EnrichmentClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .expect("reqwest client with static configuration always builds");
        Self { client }
    }

    /// Single GET to the upstream geo-IP service. Never retries — a
    /// transport failure or non-200 is itself cached by the caller with the
    /// error TTL, matching the reference.
    pub async fn lookup(&self, ip: IpAddr, now: i64) -> (EnrichmentRecord, RateLimit) {
        let url = format!("http://ip-api.com/json/{ip}?fields={UPSTREAM_FIELDS}");

        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(%ip, error = %err, "enrichment upstream transport failure");
                return (
                    EnrichmentRecord {
                        status_code: 599,
                        payload: None,
                        last_updated: now,
                    },
                    RateLimit {
                        exhausted_until: None,
                    },
                );
            }
        };

        let status_code = response.status().as_u16();

        if status_code != 200 {
            return (
                EnrichmentRecord {
                    status_code,
                    payload: None,
                    last_updated: now,
                },
                RateLimit {
                    exhausted_until: None,
                },
            );
        }

        let rate_limit = parse_rate_limit(response.headers(), now);

        let body: RawLookupResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!(%ip, error = %err, "enrichment upstream returned unparseable body");
                return (
                    EnrichmentRecord {
                        status_code: 599,
                        payload: None,
                        last_updated: now,
                    },
                    rate_limit,
                );
            }
        };

        let upstream_status = if body.status.as_deref() == Some("success") {
            UpstreamStatus::Success
        } else {
            UpstreamStatus::Fail
        };

        let payload = EnrichmentPayload {
            continent: body.continent_code,
            country: body.country_code,
            asn: body.r#as.as_deref().and_then(parse_asn),
            rdns_hostname: body.reverse.map(|h| h.trim().to_lowercase()),
            is_hosting: body.hosting.unwrap_or(false),
            is_proxy: body.proxy.unwrap_or(false),
            upstream_status,
        };

        (
            EnrichmentRecord {
                status_code,
                payload: Some(payload),
                last_updated: now,
            },
            rate_limit,
        )
    }
}

impl Default for EnrichmentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawLookupResponse {
    status: Option<String>,
    #[serde(rename = "continentCode")]
    continent_code: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    r#as: Option<String>,
    reverse: Option<String>,
    proxy: Option<bool>,
    hosting: Option<bool>,
}

/// Parses `"AS15169 Google LLC"` → `15169`. Per spec.md §4.2 and §8: the
/// field is split on whitespace, the first token has its leading two
/// characters stripped, and the remainder parsed as an integer; an absent
/// or empty field yields `None`.
fn parse_asn(raw: &str) -> Option<u32> {
    let first_token = raw.split_whitespace().next()?;
    if first_token.len() <= 2 {
        return None;
    }
    first_token[2..].parse().ok()
}

fn parse_rate_limit(headers: &reqwest::header::HeaderMap, now: i64) -> RateLimit {
    let remaining: Option<i64> = headers
        .get("X-Rl")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    let ttl: Option<i64> = headers
        .get("X-Ttl")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    match (remaining, ttl) {
        (Some(0), Some(ttl)) => RateLimit {
            exhausted_until: Some(now + ttl),
        },
        _ => RateLimit {
            exhausted_until: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_asn_prefix() {
        assert_eq!(parse_asn("AS15169 Google LLC"), Some(15169));
        assert_eq!(parse_asn("AS64512"), Some(64512));
    }

    #[test]
    fn empty_or_malformed_as_field_has_no_asn() {
        assert_eq!(parse_asn(""), None);
        assert_eq!(parse_asn("  "), None);
        assert_eq!(parse_asn("Google LLC"), None);
    }

    #[test]
    fn record_is_actionable_only_for_successful_payload() {
        let record = EnrichmentRecord {
            status_code: 200,
            payload: Some(EnrichmentPayload {
                continent: None,
                country: None,
                asn: None,
                rdns_hostname: None,
                is_hosting: false,
                is_proxy: false,
                upstream_status: UpstreamStatus::Fail,
            }),
            last_updated: 0,
        };
        assert!(!record.is_actionable());

        let record = EnrichmentRecord {
            status_code: 200,
            payload: Some(EnrichmentPayload {
                continent: Some("NA".to_string()),
                country: Some("US".to_string()),
                asn: Some(15169),
                rdns_hostname: None,
                is_hosting: false,
                is_proxy: false,
                upstream_status: UpstreamStatus::Success,
            }),
            last_updated: 0,
        };
        assert!(record.is_actionable());
    }

    #[test]
    fn rate_limit_exhaustion_only_when_remaining_is_zero() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("X-Rl", "0".parse().unwrap());
        headers.insert("X-Ttl", "60".parse().unwrap());
        let rl = parse_rate_limit(&headers, 1000);
        assert_eq!(rl.exhausted_until, Some(1060));

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("X-Rl", "5".parse().unwrap());
        headers.insert("X-Ttl", "60".parse().unwrap());
        let rl = parse_rate_limit(&headers, 1000);
        assert_eq!(rl.exhausted_until, None);
    }
}
