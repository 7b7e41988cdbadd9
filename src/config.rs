//! Config Model (spec.md §4, data model in §3).
//!
//! A declarative TOML file is loaded once at startup into an immutable
//! [`Config`], with every textual key canonicalized (trimmed, case-folded
//! per category) so the Decision Engine can do plain hash-set membership
//! checks at request time.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, FilterResult};
use crate::response::{ResponseMapping, ResponseSpecRaw};

/// On-disk shape of the config file. One-to-one with the section table in
/// spec.md §6; normalized into [`Config`] by [`RawConfig::normalize`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub block_ip: BlockIpSection,
    #[serde(default)]
    pub block_continent: BlockContinentSection,
    #[serde(default)]
    pub block_country: BlockCountrySection,
    #[serde(default)]
    pub block_asn: BlockAsnSection,
    #[serde(default)]
    pub block_rdns_hostname: BlockRdnsHostnameSection,
    #[serde(default)]
    pub block_bad_ip: BlockBadIpSection,
    #[serde(default = "default_allow_hosting")]
    pub allow_hosting: AllowHostingSection,
    #[serde(default = "default_allow_proxy")]
    pub allow_proxy: AllowProxySection,
    #[serde(default)]
    pub exception_ip: ExceptionIpSection,
    #[serde(default)]
    pub exception_path: ExceptionPathSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub disable_logging: DisableLoggingSection,
    #[serde(default)]
    pub response: ResponseSection,
    #[serde(default)]
    pub bad_ip_lists: BadIpListsSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockIpSection {
    #[serde(default)]
    pub block_ip: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockContinentSection {
    #[serde(default)]
    pub block_continent: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockCountrySection {
    #[serde(default)]
    pub block_country: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockAsnSection {
    #[serde(default)]
    pub block_asn: Vec<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockRdnsHostnameSection {
    #[serde(default)]
    pub block_rdns_hostname: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockBadIpSection {
    #[serde(default)]
    pub block_inbound_bad_ip: bool,
    #[serde(default)]
    pub block_outbound_bad_ip: bool,
}

impl Default for BlockBadIpSection {
    fn default() -> Self {
        Self {
            block_inbound_bad_ip: false,
            block_outbound_bad_ip: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowHostingSection {
    #[serde(default = "default_true")]
    pub allow_hosting: bool,
}

impl Default for AllowHostingSection {
    fn default() -> Self {
        Self { allow_hosting: true }
    }
}

fn default_allow_hosting() -> AllowHostingSection {
    AllowHostingSection::default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowProxySection {
    #[serde(default = "default_true")]
    pub allow_proxy: bool,
}

impl Default for AllowProxySection {
    fn default() -> Self {
        Self { allow_proxy: true }
    }
}

fn default_allow_proxy() -> AllowProxySection {
    AllowProxySection::default()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExceptionIpSection {
    #[serde(default)]
    pub exception_ip: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExceptionPathSection {
    #[serde(default)]
    pub exception_path: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_size")]
    pub size: usize,
    #[serde(default = "default_invalidate_success_after")]
    pub invalidate_success_after: u64,
    #[serde(default = "default_invalidate_error_after")]
    pub invalidate_error_after: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            size: default_cache_size(),
            invalidate_success_after: default_invalidate_success_after(),
            invalidate_error_after: default_invalidate_error_after(),
        }
    }
}

fn default_cache_size() -> usize {
    512
}

fn default_invalidate_success_after() -> u64 {
    604_800
}

fn default_invalidate_error_after() -> u64 {
    3_600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisableLoggingSection {
    #[serde(default)]
    pub disable_logging: bool,
}

impl Default for DisableLoggingSection {
    fn default() -> Self {
        Self {
            disable_logging: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseSection {
    pub all: Option<ResponseSpecRaw>,
    pub ip: Option<ResponseSpecRaw>,
    pub continent: Option<ResponseSpecRaw>,
    pub country: Option<ResponseSpecRaw>,
    pub asn: Option<ResponseSpecRaw>,
    pub rdns_hostname: Option<ResponseSpecRaw>,
    pub bad_ip: Option<ResponseSpecRaw>,
    pub hosting: Option<ResponseSpecRaw>,
    pub proxy: Option<ResponseSpecRaw>,
}

/// Paths to the startup bad-IP list files. See `badip.rs`; this crate loads
/// from local files rather than fetching them itself (§6 of SPEC_FULL.md).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BadIpListsSection {
    pub inbound_path: Option<String>,
    pub outbound_path: Option<String>,
    pub inbound_url: Option<String>,
    pub outbound_url: Option<String>,
}

/// The normalized, immutable configuration consulted on every request.
#[derive(Debug, Clone)]
pub struct Config {
    pub block_ip: HashSet<IpAddr>,
    pub block_continent: HashSet<String>,
    pub block_country: HashSet<String>,
    pub block_asn: HashSet<u32>,
    pub block_rdns_hostname: HashSet<String>,
    pub block_inbound_bad_ip: bool,
    pub block_outbound_bad_ip: bool,
    pub allow_hosting: bool,
    pub allow_proxy: bool,
    pub exception_ip: HashSet<IpAddr>,
    pub exception_path: HashSet<String>,
    pub cache_size: usize,
    pub invalidate_success_after: Duration,
    pub invalidate_error_after: Duration,
    pub disable_logging: bool,
    pub response: ResponseMapping,
    pub bad_ip_lists: BadIpListsSection,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> FilterResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FilterError::Config(format!("failed to read config file: {e}")))?;
        let raw: RawConfig = toml::from_str(&content)
            .map_err(|e| FilterError::Config(format!("failed to parse config: {e}")))?;
        raw.normalize()
    }
}

impl RawConfig {
    /// Canonicalizes every textual key per spec.md §6: IPs through the
    /// standard parser, continent/country codes uppercased, hostnames
    /// lowercased, paths trimmed — and validates response specs.
    pub fn normalize(self) -> FilterResult<Config> {
        let block_ip = parse_ip_set(&self.block_ip.block_ip)?;
        let exception_ip = parse_ip_set(&self.exception_ip.exception_ip)?;

        let block_continent = self
            .block_continent
            .block_continent
            .iter()
            .map(|s| s.trim().to_uppercase())
            .collect();
        let block_country = self
            .block_country
            .block_country
            .iter()
            .map(|s| s.trim().to_uppercase())
            .collect();
        let block_rdns_hostname = self
            .block_rdns_hostname
            .block_rdns_hostname
            .iter()
            .map(|s| s.trim().to_lowercase())
            .collect();
        let exception_path = self
            .exception_path
            .exception_path
            .iter()
            .map(|s| s.trim().to_string())
            .collect();
        let block_asn = self.block_asn.block_asn.iter().copied().collect();

        let response = ResponseMapping {
            all: self.response.all.map(|r| r.into_spec()).transpose()?,
            ip: self
                .response
                .ip
                .map(|r| r.into_spec())
                .transpose()?
                .unwrap_or_else(crate::response::ResponseSpec::forbidden_default),
            continent: self
                .response
                .continent
                .map(|r| r.into_spec())
                .transpose()?
                .unwrap_or_else(crate::response::ResponseSpec::forbidden_default),
            country: self
                .response
                .country
                .map(|r| r.into_spec())
                .transpose()?
                .unwrap_or_else(crate::response::ResponseSpec::forbidden_default),
            asn: self
                .response
                .asn
                .map(|r| r.into_spec())
                .transpose()?
                .unwrap_or_else(crate::response::ResponseSpec::forbidden_default),
            rdns_hostname: self
                .response
                .rdns_hostname
                .map(|r| r.into_spec())
                .transpose()?
                .unwrap_or_else(crate::response::ResponseSpec::forbidden_default),
            bad_ip: self
                .response
                .bad_ip
                .map(|r| r.into_spec())
                .transpose()?
                .unwrap_or_else(crate::response::ResponseSpec::forbidden_default),
            hosting: self
                .response
                .hosting
                .map(|r| r.into_spec())
                .transpose()?
                .unwrap_or_else(crate::response::ResponseSpec::forbidden_default),
            proxy: self
                .response
                .proxy
                .map(|r| r.into_spec())
                .transpose()?
                .unwrap_or_else(crate::response::ResponseSpec::forbidden_default),
        };

        Ok(Config {
            block_ip,
            block_continent,
            block_country,
            block_asn,
            block_rdns_hostname,
            block_inbound_bad_ip: self.block_bad_ip.block_inbound_bad_ip,
            block_outbound_bad_ip: self.block_bad_ip.block_outbound_bad_ip,
            allow_hosting: self.allow_hosting.allow_hosting,
            allow_proxy: self.allow_proxy.allow_proxy,
            exception_ip,
            exception_path,
            cache_size: self.cache.size,
            invalidate_success_after: Duration::from_secs(self.cache.invalidate_success_after),
            invalidate_error_after: Duration::from_secs(self.cache.invalidate_error_after),
            disable_logging: self.disable_logging.disable_logging,
            response,
            bad_ip_lists: self.bad_ip_lists,
        })
    }
}

fn parse_ip_set(raw: &[String]) -> FilterResult<HashSet<IpAddr>> {
    raw.iter()
        .map(|s| {
            s.trim()
                .parse::<IpAddr>()
                .map_err(|e| FilterError::Config(format!("invalid IP literal {s:?}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let raw = RawConfig {
            block_continent: BlockContinentSection {
                block_continent: vec![" as ".to_string()],
            },
            block_rdns_hostname: BlockRdnsHostnameSection {
                block_rdns_hostname: vec!["Example.COM ".to_string()],
            },
            exception_path: ExceptionPathSection {
                exception_path: vec![" /health ".to_string()],
            },
            ..Default::default()
        };
        let config = raw.normalize().unwrap();
        assert!(config.block_continent.contains("AS"));
        assert!(config.block_rdns_hostname.contains("example.com"));
        assert!(config.exception_path.contains("/health"));
    }

    #[test]
    fn defaults_match_spec() {
        let config = RawConfig::default().normalize().unwrap();
        assert!(config.allow_hosting);
        assert!(config.allow_proxy);
        assert!(!config.block_inbound_bad_ip);
        assert!(!config.block_outbound_bad_ip);
        assert_eq!(config.cache_size, 512);
        assert_eq!(config.invalidate_success_after, Duration::from_secs(604_800));
        assert_eq!(config.invalidate_error_after, Duration::from_secs(3_600));
        assert!(!config.disable_logging);
    }

    #[test]
    fn rejects_invalid_ip_literal() {
        let raw = RawConfig {
            block_ip: BlockIpSection {
                block_ip: vec!["not-an-ip".to_string()],
            },
            ..Default::default()
        };
        assert!(raw.normalize().is_err());
    }
}
