//! Decision Engine (spec.md §4.4).
//!
//! Pure function: given a canonicalized IP, request path, a successful
//! populated [`EnrichmentRecord`], the [`Config`], and the [`BadIpLists`],
//! returns `FORWARD` or `DENY(category)`. No I/O — every side effect
//! (logging, response emission) belongs to the middleware layer.
//!
//! Grounded in `security.rs`'s `is_ip_in_list`/`check_cidr` pattern,
//! generalized to exact-match `HashSet` membership: spec.md's `block_ip`/
//! `exception_ip` are literal-address sets, not CIDR ranges.

use std::net::IpAddr;

use crate::config::Config;
use crate::badip::BadIpLists;
use crate::enrichment::EnrichmentPayload;
use crate::response::DenyCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Forward,
    Deny(DenyCategory),
}

/// Evaluates the eight block categories in spec.md §4.4's fixed order,
/// first match wins, each suppressed by `exception_ip`/`exception_path`.
pub fn decide(
    ip: IpAddr,
    path: &str,
    record: &EnrichmentPayload,
    config: &Config,
    bad_ip_lists: &BadIpLists,
) -> Decision {
    let excepted = config.exception_ip.contains(&ip) || config.exception_path.contains(path);
    if excepted {
        return Decision::Forward;
    }

    let ip_text = ip.to_string();

    if config.block_inbound_bad_ip && bad_ip_lists.inbound.contains(&ip_text) {
        return Decision::Deny(DenyCategory::InboundBadIp);
    }
    if config.block_outbound_bad_ip && bad_ip_lists.outbound.contains(&ip_text) {
        return Decision::Deny(DenyCategory::OutboundBadIp);
    }
    if let Some(continent) = &record.continent {
        if config.block_continent.contains(continent) {
            return Decision::Deny(DenyCategory::Continent);
        }
    }
    if let Some(country) = &record.country {
        if config.block_country.contains(country) {
            return Decision::Deny(DenyCategory::Country);
        }
    }
    if let Some(asn) = record.asn {
        if config.block_asn.contains(&asn) {
            return Decision::Deny(DenyCategory::Asn);
        }
    }
    if let Some(hostname) = &record.rdns_hostname {
        if config.block_rdns_hostname.contains(hostname) {
            return Decision::Deny(DenyCategory::RdnsHostname);
        }
    }
    if !config.allow_hosting && record.is_hosting {
        return Decision::Deny(DenyCategory::Hosting);
    }
    if !config.allow_proxy && record.is_proxy {
        return Decision::Deny(DenyCategory::Proxy);
    }

    Decision::Forward
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use crate::enrichment::UpstreamStatus;

    fn payload() -> EnrichmentPayload {
        EnrichmentPayload {
            continent: Some("AS".to_string()),
            country: Some("CN".to_string()),
            asn: Some(15169),
            rdns_hostname: Some("example.com".to_string()),
            is_hosting: true,
            is_proxy: true,
            upstream_status: UpstreamStatus::Success,
        }
    }

    #[test]
    fn evaluation_order_first_match_wins() {
        let mut raw = RawConfig::default();
        raw.block_continent.block_continent = vec!["AS".to_string()];
        raw.block_country.block_country = vec!["CN".to_string()];
        let config = raw.normalize().unwrap();
        let lists = BadIpLists::default();

        let decision = decide("1.2.3.4".parse().unwrap(), "/", &payload(), &config, &lists);
        assert_eq!(decision, Decision::Deny(DenyCategory::Continent));
    }

    #[test]
    fn exception_ip_suppresses_every_rule() {
        let mut raw = RawConfig::default();
        raw.block_continent.block_continent = vec!["AS".to_string()];
        raw.exception_ip.exception_ip = vec!["1.2.3.4".to_string()];
        let config = raw.normalize().unwrap();
        let lists = BadIpLists::default();

        let decision = decide("1.2.3.4".parse().unwrap(), "/", &payload(), &config, &lists);
        assert_eq!(decision, Decision::Forward);
    }

    #[test]
    fn exception_path_suppresses_every_rule() {
        let mut raw = RawConfig::default();
        raw.block_country.block_country = vec!["CN".to_string()];
        raw.exception_path.exception_path = vec!["/health".to_string()];
        let config = raw.normalize().unwrap();
        let lists = BadIpLists::default();

        let decision = decide(
            "1.2.3.4".parse().unwrap(),
            "/health",
            &payload(),
            &config,
            &lists,
        );
        assert_eq!(decision, Decision::Forward);

        let decision = decide("1.2.3.4".parse().unwrap(), "/data", &payload(), &config, &lists);
        assert_eq!(decision, Decision::Deny(DenyCategory::Country));
    }

    #[test]
    fn hosting_and_proxy_denied_only_when_disallowed() {
        let config = RawConfig::default().normalize().unwrap();
        let lists = BadIpLists::default();
        // allow_hosting/allow_proxy default true, so a hosting+proxy IP forwards
        let decision = decide("1.2.3.4".parse().unwrap(), "/", &payload(), &config, &lists);
        assert_eq!(decision, Decision::Forward);
    }

    #[test]
    fn inbound_bad_ip_takes_priority_over_outbound() {
        let mut raw = RawConfig::default();
        raw.block_bad_ip.block_inbound_bad_ip = true;
        raw.block_bad_ip.block_outbound_bad_ip = true;
        let config = raw.normalize().unwrap();
        let mut lists = BadIpLists::default();
        lists.inbound.insert("1.2.3.4".to_string());
        lists.outbound.insert("1.2.3.4".to_string());

        let decision = decide("1.2.3.4".parse().unwrap(), "/", &payload(), &config, &lists);
        assert_eq!(decision, Decision::Deny(DenyCategory::InboundBadIp));
    }

    #[test]
    fn absent_asn_never_matches() {
        let mut raw = RawConfig::default();
        raw.block_asn.block_asn = vec![15169];
        let config = raw.normalize().unwrap();
        let lists = BadIpLists::default();
        let mut p = payload();
        p.asn = None;

        let decision = decide("1.2.3.4".parse().unwrap(), "/", &p, &config, &lists);
        assert_eq!(decision, Decision::Forward);
    }
}
