//! Value extraction from source text
//!
//! Each list kind has an [`Extractor`]: a regex finds candidate spans in a
//! line and a validator decides whether each candidate is kept.
//!
//! - IP: dotted-quad IPv4 or full 8-group IPv6, parsed as [`IpAddr`],
//!   optionally restricted to globally routable addresses
//! - Domain: dot-separated labels ending in an alphabetic TLD
//! - URL: `http`, `https` or `ftp` spans that re-parse with a host
//!
//! A candidate that fails validation is logged and dropped; extraction
//! itself never fails.

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::model::ListKind;
use ipnet::{Ipv4Net, Ipv6Net};
use regex::Regex;
use std::net::IpAddr;
use tracing::{debug, warn};

const IP_PATTERN: &str =
    r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b|\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b";

const DOMAIN_PATTERN: &str = r"\b(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}\b";

const URL_PATTERN: &str =
    r"(?i)\b(?:https?|ftp)://[-A-Z0-9+&@#/%?=~_|!:,.;]*[-A-Z0-9+&@#/%=~_|]";

/// IPv4 ranges that are not globally routable
const NON_GLOBAL_V4: &[&str] = &[
    "0.0.0.0/8",       // "this" network
    "10.0.0.0/8",      // private
    "100.64.0.0/10",   // shared address space
    "127.0.0.0/8",     // loopback
    "169.254.0.0/16",  // link-local
    "172.16.0.0/12",   // private
    "192.0.0.0/24",    // IETF protocol assignments
    "192.0.2.0/24",    // documentation
    "192.168.0.0/16",  // private
    "198.18.0.0/15",   // benchmarking
    "198.51.100.0/24", // documentation
    "203.0.113.0/24",  // documentation
    "240.0.0.0/4",     // reserved, includes broadcast
];

/// IPv6 ranges that are not globally routable
const NON_GLOBAL_V6: &[&str] = &[
    "::/128",
    "::1/128",
    "::ffff:0:0/96",
    "64:ff9b:1::/48",
    "100::/64",
    "2001::/23",
    "2001:db8::/32",
    "fc00::/7",
    "fe80::/10",
];

/// Pulls well-formed values of one list kind out of text
pub trait Extractor: Send + Sync {
    /// The kind this extractor produces
    fn kind(&self) -> ListKind;

    /// Candidate spans in `line`, in order of appearance
    fn candidates<'a>(&self, line: &'a str) -> Vec<&'a str>;

    /// Check one candidate
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: keep it
    /// - `Ok(false)`: well-formed but filtered out by policy
    /// - `Err(Error::Parse)`: malformed
    fn validate(&self, candidate: &str) -> Result<bool>;

    /// Accepted values in `line`, in order of appearance
    fn extract(&self, line: &str) -> Vec<String> {
        let mut values = Vec::new();
        for candidate in self.candidates(line) {
            match self.validate(candidate) {
                Ok(true) => values.push(candidate.to_string()),
                Ok(false) => debug!("Filtered {} value {}", self.kind(), candidate),
                Err(e) => warn!("Dropping invalid {} value {}: {}", self.kind(), candidate, e),
            }
        }
        values
    }
}

/// Build the extractor for a kind under the given policy
pub fn extractor_for(kind: ListKind, config: &ExtractionConfig) -> Result<Box<dyn Extractor>> {
    Ok(match kind {
        ListKind::Ip => Box::new(IpExtractor::new(config.global_ips_only)?),
        ListKind::Domain => Box::new(DomainExtractor::new()?),
        ListKind::Url => Box::new(UrlExtractor::new()?),
    })
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::config(format!("Invalid pattern {}: {}", pattern, e)))
}

/// IP address extractor
pub struct IpExtractor {
    pattern: Regex,
    global_only: bool,
    non_global_v4: Vec<Ipv4Net>,
    non_global_v6: Vec<Ipv6Net>,
}

impl IpExtractor {
    /// Create an IP extractor
    ///
    /// # Parameters
    ///
    /// - `global_only`: reject addresses that are not globally routable
    pub fn new(global_only: bool) -> Result<Self> {
        let non_global_v4 = NON_GLOBAL_V4
            .iter()
            .map(|net| {
                net.parse()
                    .map_err(|e| Error::config(format!("Invalid network {}: {}", net, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        let non_global_v6 = NON_GLOBAL_V6
            .iter()
            .map(|net| {
                net.parse()
                    .map_err(|e| Error::config(format!("Invalid network {}: {}", net, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            pattern: compile(IP_PATTERN)?,
            global_only,
            non_global_v4,
            non_global_v6,
        })
    }

    /// Whether `ip` is globally routable
    pub fn is_global(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => !self.non_global_v4.iter().any(|net| net.contains(&v4)),
            IpAddr::V6(v6) => !self.non_global_v6.iter().any(|net| net.contains(&v6)),
        }
    }
}

impl Extractor for IpExtractor {
    fn kind(&self) -> ListKind {
        ListKind::Ip
    }

    fn candidates<'a>(&self, line: &'a str) -> Vec<&'a str> {
        self.pattern.find_iter(line).map(|m| m.as_str()).collect()
    }

    fn validate(&self, candidate: &str) -> Result<bool> {
        let ip: IpAddr = candidate
            .parse()
            .map_err(|_| Error::parse(format!("Invalid IP address: {}", candidate)))?;
        Ok(!self.global_only || self.is_global(ip))
    }
}

/// Domain name extractor
pub struct DomainExtractor {
    pattern: Regex,
}

impl DomainExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: compile(DOMAIN_PATTERN)?,
        })
    }
}

impl Extractor for DomainExtractor {
    fn kind(&self) -> ListKind {
        ListKind::Domain
    }

    fn candidates<'a>(&self, line: &'a str) -> Vec<&'a str> {
        self.pattern.find_iter(line).map(|m| m.as_str()).collect()
    }

    // The pattern already enforces label length and hyphen placement.
    fn validate(&self, _candidate: &str) -> Result<bool> {
        Ok(true)
    }
}

/// URL extractor
pub struct UrlExtractor {
    pattern: Regex,
}

impl UrlExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: compile(URL_PATTERN)?,
        })
    }
}

impl Extractor for UrlExtractor {
    fn kind(&self) -> ListKind {
        ListKind::Url
    }

    fn candidates<'a>(&self, line: &'a str) -> Vec<&'a str> {
        self.pattern.find_iter(line).map(|m| m.as_str()).collect()
    }

    fn validate(&self, candidate: &str) -> Result<bool> {
        let parsed = url::Url::parse(candidate)
            .map_err(|e| Error::parse(format!("Invalid URL {}: {}", candidate, e)))?;
        let has_host = parsed.host_str().is_some_and(|host| !host.is_empty());
        if parsed.scheme().is_empty() || !has_host {
            return Err(Error::parse(format!("URL has no host: {}", candidate)));
        }
        Ok(true)
    }
}
