//! Startup bad-IP list loading (spec.md §6, "Startup blocklist sources").
//!
//! The reference implementation fetches two plain-text files (one IP per
//! line) over HTTPS at init and treats their URLs as fixed, part of the
//! config contract. This crate resolves each direction independently from
//! either a local path or a URL (see [`BadIpLists::load`], called from
//! `main.rs`): a path takes precedence when both are configured for the
//! same direction, otherwise a configured URL is fetched over HTTPS, and an
//! unconfigured direction yields an empty set.

use std::collections::HashSet;

use crate::config::BadIpListsSection;
use crate::error::{FilterError, FilterResult};

/// Two sets of raw IP strings, loaded once at startup and read-only for the
/// life of the process (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct BadIpLists {
    pub inbound: HashSet<String>,
    pub outbound: HashSet<String>,
}

impl BadIpLists {
    /// Loads both lists from local files only, ignoring any configured
    /// URLs. A direction with no path configured yields an empty set rather
    /// than an error — `block_inbound_bad_ip`/`block_outbound_bad_ip`
    /// default to `false`, so an unconfigured list is simply never
    /// consulted.
    pub fn load_from_files(section: &BadIpListsSection) -> FilterResult<Self> {
        let inbound = match &section.inbound_path {
            Some(path) => read_ip_list(path)?,
            None => HashSet::new(),
        };
        let outbound = match &section.outbound_path {
            Some(path) => read_ip_list(path)?,
            None => HashSet::new(),
        };
        Ok(Self { inbound, outbound })
    }

    /// Fetches both lists over HTTPS using the caller's `reqwest::Client`,
    /// mirroring the original's `httpx.get(...)` startup fetch, ignoring any
    /// configured paths. Any transport or non-200 failure is fatal — the
    /// stricter reading of spec.md §9's open question on fetch-failure
    /// handling.
    pub async fn fetch_remote(
        client: &reqwest::Client,
        section: &BadIpListsSection,
    ) -> FilterResult<Self> {
        let inbound = match &section.inbound_url {
            Some(url) => fetch_ip_list(client, url).await?,
            None => HashSet::new(),
        };
        let outbound = match &section.outbound_url {
            Some(url) => fetch_ip_list(client, url).await?,
            None => HashSet::new(),
        };
        Ok(Self { inbound, outbound })
    }

    /// Resolves both directions independently: a configured path is read
    /// from disk, otherwise a configured URL is fetched over HTTPS,
    /// otherwise the direction is an empty set. This is what `main.rs` calls
    /// at startup so that `inbound_path`/`outbound_path` and
    /// `inbound_url`/`outbound_url` are both honored, per-direction.
    pub async fn load(client: &reqwest::Client, section: &BadIpListsSection) -> FilterResult<Self> {
        let inbound = match (&section.inbound_path, &section.inbound_url) {
            (Some(path), _) => read_ip_list(path)?,
            (None, Some(url)) => fetch_ip_list(client, url).await?,
            (None, None) => HashSet::new(),
        };
        let outbound = match (&section.outbound_path, &section.outbound_url) {
            (Some(path), _) => read_ip_list(path)?,
            (None, Some(url)) => fetch_ip_list(client, url).await?,
            (None, None) => HashSet::new(),
        };
        Ok(Self { inbound, outbound })
    }
}

fn read_ip_list(path: &str) -> FilterResult<HashSet<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| FilterError::BadIpList(format!("failed to read {path}: {e}")))?;
    Ok(parse_lines(&content))
}

async fn fetch_ip_list(client: &reqwest::Client, url: &str) -> FilterResult<HashSet<String>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FilterError::BadIpList(format!("failed to fetch {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(FilterError::BadIpList(format!(
            "fetching {url} returned status {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| FilterError::BadIpList(format!("failed to read body of {url}: {e}")))?;
    Ok(parse_lines(&body))
}

fn parse_lines(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_newline_delimited_ips() {
        let set = parse_lines("1.2.3.4\n5.6.7.8\n\n  9.9.9.9  \n");
        assert_eq!(set.len(), 3);
        assert!(set.contains("9.9.9.9"));
    }

    #[test]
    fn load_from_files_reads_both_directions() {
        let inbound_path = write_tempfile("inbound", "10.0.0.1\n10.0.0.2\n");
        let outbound_path = write_tempfile("outbound", "20.0.0.1\n");

        let section = BadIpListsSection {
            inbound_path: Some(inbound_path),
            outbound_path: Some(outbound_path),
            inbound_url: None,
            outbound_url: None,
        };

        let lists = BadIpLists::load_from_files(&section).unwrap();
        assert_eq!(lists.inbound.len(), 2);
        assert_eq!(lists.outbound.len(), 1);
    }

    #[test]
    fn unconfigured_direction_is_empty_not_error() {
        let section = BadIpListsSection::default();
        let lists = BadIpLists::load_from_files(&section).unwrap();
        assert!(lists.inbound.is_empty());
        assert!(lists.outbound.is_empty());
    }

    #[tokio::test]
    async fn load_prefers_path_over_url_and_falls_back_to_empty() {
        let inbound_path = write_tempfile("load_inbound", "30.0.0.1\n");

        let section = BadIpListsSection {
            inbound_path: Some(inbound_path),
            outbound_path: None,
            inbound_url: Some("http://unused.invalid/inbound.txt".to_string()),
            outbound_url: None,
        };

        let client = reqwest::Client::new();
        let lists = BadIpLists::load(&client, &section).await.unwrap();
        assert_eq!(lists.inbound.len(), 1);
        assert!(lists.inbound.contains("30.0.0.1"));
        assert!(lists.outbound.is_empty());
    }

    fn write_tempfile(tag: &str, content: &str) -> String {
        let mut path = std::env::temp_dir();
        path.push(format!("badip_test_{}_{}", std::process::id(), tag));
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path.to_string_lossy().to_string()
    }
}
