//! CIDR membership test, lifted from the teacher's `security.rs`
//! (`check_cidr`) and reused here to classify private/reserved client IPs
//! (spec.md §4.5's "non-public IP" short-circuit).

use std::net::IpAddr;

/// IANA special-purpose ranges plus RFC1918/RFC4193 private space. Fixed at
/// compile time — there is no config knob for this list in spec.md.
const PRIVATE_OR_RESERVED_RANGES: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "::1/128",
    "::/128",
    "fc00::/7",
    "fe80::/10",
];

pub fn is_private_or_reserved(ip: &IpAddr) -> bool {
    PRIVATE_OR_RESERVED_RANGES
        .iter()
        .any(|cidr| check_cidr(ip, cidr).unwrap_or(false))
}

fn check_cidr(ip: &IpAddr, cidr: &str) -> Option<bool> {
    let (network_part, prefix_part) = cidr.split_once('/')?;
    let network_ip: IpAddr = network_part.parse().ok()?;
    let prefix_len: u8 = prefix_part.parse().ok()?;

    match (ip, network_ip) {
        (IpAddr::V4(ip), IpAddr::V4(network)) => {
            if prefix_len > 32 {
                return None;
            }
            let mask = if prefix_len == 0 {
                0u32
            } else {
                !0u32 << (32 - prefix_len)
            };
            Some((u32::from(*ip) & mask) == (u32::from(network) & mask))
        }
        (IpAddr::V6(ip), IpAddr::V6(network)) => {
            if prefix_len > 128 {
                return None;
            }
            let mask = if prefix_len == 0 {
                0u128
            } else {
                !0u128 << (128 - prefix_len)
            };
            Some((u128::from(*ip) & mask) == (u128::from(network) & mask))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_private_v4_ranges() {
        assert!(is_private_or_reserved(&"10.1.2.3".parse().unwrap()));
        assert!(is_private_or_reserved(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_or_reserved(&"127.0.0.1".parse().unwrap()));
        assert!(!is_private_or_reserved(&"8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn detects_loopback_and_unique_local_v6() {
        assert!(is_private_or_reserved(&"::1".parse().unwrap()));
        assert!(is_private_or_reserved(&"fc00::1".parse().unwrap()));
        assert!(!is_private_or_reserved(&"2001:4860:4860::8888".parse().unwrap()));
    }
}
